//! Read-side view of resolved values through their annotation interface.

use std::fmt;

use crate::classpath::{AnnotationInterface, TypeLookup};
use crate::codec;
use crate::defaults::LoaderContext;
use crate::error::{ProjectionError, ReaderError};
use crate::types::{ClassRef, EnumRef};
use crate::value::{AnnotationValue, Value};

/// Conversion from an element value to a Rust accessor type.
pub trait FromValue: Sized {
    /// Type name reported when the conversion does not apply.
    fn expected() -> String;

    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! from_value {
    ($ty:ty, $variant:ident, $name:expr) => {
        impl FromValue for $ty {
            fn expected() -> String {
                $name.to_string()
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(inner) => Some(inner.clone()),
                    _ => None,
                }
            }
        }
    };
}

from_value!(i8, Byte, "byte");
from_value!(i16, Short, "short");
from_value!(i32, Int, "int");
from_value!(i64, Long, "long");
from_value!(f32, Float, "float");
from_value!(f64, Double, "double");
from_value!(bool, Boolean, "boolean");
from_value!(char, Char, "char");
from_value!(String, String, "java.lang.String");
from_value!(ClassRef, Class, "java.lang.Class");
from_value!(EnumRef, Enum, "enum");
from_value!(AnnotationValue, Annotation, "annotation");

impl<T: FromValue> FromValue for Vec<T> {
    fn expected() -> String {
        format!("{}[]", T::expected())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(values) => values.iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}

/// A resolved annotation exposed through the interface it was resolved
/// against.
#[derive(Clone, Copy)]
pub struct AnnotationInstance<'a> {
    value: &'a AnnotationValue,
    interface: &'a AnnotationInterface,
    types: &'a dyn TypeLookup,
}

impl<'a> AnnotationInstance<'a> {
    pub fn new(
        value: &'a AnnotationValue,
        types: &'a dyn TypeLookup,
    ) -> Result<Self, ProjectionError> {
        let interface = types.annotation(&value.annotation_type).ok_or_else(|| {
            ProjectionError::InterfaceNotFound {
                name: value.annotation_type.clone(),
            }
        })?;
        Ok(Self {
            value,
            interface,
            types,
        })
    }

    pub fn annotation_type(&self) -> &'a str {
        &self.value.annotation_type
    }

    pub fn interface(&self) -> &'a AnnotationInterface {
        self.interface
    }

    pub fn value(&self) -> &'a AnnotationValue {
        self.value
    }

    /// Value of a declared element. Elements with no value and no default
    /// are reported as incomplete.
    pub fn get(&self, element: &str) -> Result<&'a Value, ProjectionError> {
        if self.interface.element(element).is_none() {
            return Err(ProjectionError::UnknownElement {
                interface: self.interface.name.clone(),
                element: element.to_string(),
            });
        }
        self.value
            .get(element)
            .ok_or_else(|| ProjectionError::IncompleteAnnotation {
                interface: self.interface.name.clone(),
                element: element.to_string(),
            })
    }

    pub fn get_as<T: FromValue>(&self, element: &str) -> Result<T, ProjectionError> {
        let value = self.get(element)?;
        T::from_value(value).ok_or_else(|| ProjectionError::TypeMismatch {
            interface: self.interface.name.clone(),
            element: element.to_string(),
            expected: T::expected(),
            found: value.kind_name(),
        })
    }

    /// Nested annotation element, projected through its own interface.
    pub fn nested(&self, element: &str) -> Result<AnnotationInstance<'a>, ProjectionError> {
        match self.get(element)? {
            Value::Annotation(value) => AnnotationInstance::new(value, self.types),
            other => Err(ProjectionError::TypeMismatch {
                interface: self.interface.name.clone(),
                element: element.to_string(),
                expected: "annotation".to_string(),
                found: other.kind_name(),
            }),
        }
    }
}

impl fmt::Debug for AnnotationInstance<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotationInstance")
            .field("value", self.value)
            .finish()
    }
}

impl fmt::Display for AnnotationInstance<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.value, f)
    }
}

/// The annotations attached to one member, decoded from its attribute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemberAnnotations {
    annotations: Vec<AnnotationValue>,
}

impl MemberAnnotations {
    pub fn decode(bytes: &[u8], context: &LoaderContext<'_>) -> Result<Self, ReaderError> {
        let annotations = codec::decode_member_attribute(bytes, context)?;
        Ok(Self { annotations })
    }

    pub fn annotations(&self) -> &[AnnotationValue] {
        &self.annotations
    }

    /// Lookup by qualified or simple name.
    pub fn annotation(&self, name: &str) -> Option<&AnnotationValue> {
        self.annotations
            .iter()
            .find(|annotation| annotation.is_named(name))
    }

    pub fn is_annotation_present(&self, name: &str) -> bool {
        self.annotation(name).is_some()
    }

    pub fn instance<'a>(
        &'a self,
        name: &str,
        types: &'a dyn TypeLookup,
    ) -> Result<Option<AnnotationInstance<'a>>, ProjectionError> {
        self.annotation(name)
            .map(|annotation| AnnotationInstance::new(annotation, types))
            .transpose()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }
}

impl From<Vec<AnnotationValue>> for MemberAnnotations {
    fn from(annotations: Vec<AnnotationValue>) -> Self {
        Self { annotations }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_harness::TestHarness;

    fn resolve(harness: &TestHarness, literal: &str) -> AnnotationValue {
        harness
            .resolve(literal)
            .expect("resolve")
            .expect("annotation found")
    }

    #[test]
    fn typed_accessors_read_elements() {
        let harness = TestHarness::new();
        let value = resolve(
            &harness,
            "Everything(i = 7, l = 8, strs = {\"a\", \"b\"}, cls = String[].class, color = Color.BLUE)",
        );
        let instance = AnnotationInstance::new(&value, harness.index()).expect("project");
        assert_eq!(instance.annotation_type(), "test.Everything");
        assert_eq!(instance.get_as::<i32>("i").expect("i"), 7);
        assert_eq!(instance.get_as::<i64>("l").expect("l"), 8);
        assert_eq!(
            instance.get_as::<Vec<String>>("strs").expect("strs"),
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(
            instance.get_as::<ClassRef>("cls").expect("cls"),
            ClassRef::new("java.lang.String", 1)
        );
        assert_eq!(
            instance.get_as::<EnumRef>("color").expect("color"),
            EnumRef::new("test.Color", "BLUE")
        );
        assert_eq!(instance.get_as::<char>("c").expect("default"), 'a');
        assert!(instance.get_as::<Vec<i32>>("ints").expect("ints").is_empty());
    }

    #[test]
    fn accessor_type_mismatch_is_reported() {
        let harness = TestHarness::new();
        let value = resolve(&harness, "IntAnno(3)");
        let instance = AnnotationInstance::new(&value, harness.index()).expect("project");
        assert_eq!(
            instance.get_as::<String>("value").expect_err("mismatch"),
            ProjectionError::TypeMismatch {
                interface: "test.IntAnno".to_string(),
                element: "value".to_string(),
                expected: "java.lang.String".to_string(),
                found: "int".to_string(),
            }
        );
        assert!(matches!(
            instance.get("missing"),
            Err(ProjectionError::UnknownElement { .. })
        ));
    }

    #[test]
    fn nested_annotations_project_through_their_interface() {
        let harness = TestHarness::new();
        let value = resolve(&harness, r#"Everything(anno = @Simple(val = "x", s = "y"))"#);
        let instance = AnnotationInstance::new(&value, harness.index()).expect("project");
        let nested = instance.nested("anno").expect("nested");
        assert_eq!(nested.annotation_type(), "test.Simple");
        assert_eq!(nested.get_as::<String>("val").expect("val"), "x");
        assert!(matches!(
            instance.nested("i"),
            Err(ProjectionError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn unknown_interface_is_an_error() {
        let harness = TestHarness::new();
        let value = AnnotationValue::new("gone.Missing");
        assert_eq!(
            AnnotationInstance::new(&value, harness.index()).expect_err("missing"),
            ProjectionError::InterfaceNotFound {
                name: "gone.Missing".to_string(),
            }
        );
    }

    #[test]
    fn element_without_value_is_incomplete() {
        let harness = TestHarness::new();
        let value = AnnotationValue::new("test.Defaults");
        let instance = AnnotationInstance::new(&value, harness.index()).expect("project");
        assert!(matches!(
            instance.get("required"),
            Err(ProjectionError::IncompleteAnnotation { .. })
        ));
    }

    #[test]
    fn member_annotations_are_queried_by_name() {
        let harness = TestHarness::new();
        let annotations = vec![
            resolve(&harness, "IntAnno(1)"),
            resolve(&harness, "DefaultInt"),
        ];
        let bytes = codec::encode_member_attribute(&annotations).expect("encode");
        let member = MemberAnnotations::decode(&bytes, &harness.context()).expect("decode");
        assert_eq!(member.len(), 2);
        assert!(member.is_annotation_present("test.IntAnno"));
        assert!(member.is_annotation_present("DefaultInt"));
        assert!(!member.is_annotation_present("Marker"));
        let instance = member
            .instance("DefaultInt", harness.index())
            .expect("project")
            .expect("present");
        assert_eq!(instance.get_as::<i32>("value").expect("value"), 3);
        assert_eq!(instance.to_string(), "@test.DefaultInt(value=3)");
    }
}
