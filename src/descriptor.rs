use std::str::FromStr;

use anyhow::{Context, Result, bail};
use jdescriptor::{MethodDescriptor, TypeDescriptor};

use crate::types::{ClassRef, ElementType};

/// Shape of a JVM type descriptor before object types are classified as
/// enums, annotations or plain classes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum DescriptorType {
    Primitive(ElementType),
    Void,
    /// Qualified (dotted) class name.
    Object(String),
    Array(Box<DescriptorType>),
}

/// Return type of an annotation element descriptor such as `()[J`.
/// Annotation elements take no parameters.
pub(crate) fn element_return_type(descriptor: &str) -> Result<DescriptorType> {
    let descriptor = MethodDescriptor::from_str(descriptor)
        .with_context(|| format!("parse method descriptor {descriptor}"))?;
    if !descriptor.parameter_types().is_empty() {
        bail!("annotation elements take no parameters");
    }
    convert(&descriptor.return_type().clone())
}

/// Parse a field descriptor (`I`, `Ljava/lang/String;`, `[[I`) or `V`.
pub(crate) fn field_type(descriptor: &str) -> Result<DescriptorType> {
    if descriptor.is_empty() || descriptor.contains(['(', ')']) {
        bail!("not a field descriptor: {descriptor}");
    }
    let method = MethodDescriptor::from_str(&format!("(){descriptor}"))
        .with_context(|| format!("parse field descriptor {descriptor}"))?;
    convert(&method.return_type().clone())
}

/// Class literal from its field descriptor.
pub(crate) fn class_ref(descriptor: &str) -> Result<ClassRef> {
    let mut ty = field_type(descriptor)?;
    let mut dimensions: u8 = 0;
    while let DescriptorType::Array(inner) = ty {
        dimensions = dimensions
            .checked_add(1)
            .context("too many array dimensions")?;
        ty = *inner;
    }
    let name = match ty {
        DescriptorType::Primitive(primitive) => primitive.to_string(),
        DescriptorType::Void if dimensions == 0 => "void".to_string(),
        DescriptorType::Void => bail!("array of void"),
        DescriptorType::Object(name) => name,
        DescriptorType::Array(_) => unreachable!("arrays are unwrapped above"),
    };
    Ok(ClassRef::new(name, dimensions))
}

/// Qualified class name from an object descriptor `Lcom/example/Color;`.
pub(crate) fn object_name(descriptor: &str) -> Result<String> {
    match field_type(descriptor)? {
        DescriptorType::Object(name) => Ok(name),
        _ => bail!("not an object descriptor: {descriptor}"),
    }
}

fn convert(descriptor: &TypeDescriptor) -> Result<DescriptorType> {
    #[allow(unreachable_patterns)]
    let ty = match descriptor {
        TypeDescriptor::Byte => DescriptorType::Primitive(ElementType::Byte),
        TypeDescriptor::Short => DescriptorType::Primitive(ElementType::Short),
        TypeDescriptor::Integer => DescriptorType::Primitive(ElementType::Int),
        TypeDescriptor::Long => DescriptorType::Primitive(ElementType::Long),
        TypeDescriptor::Float => DescriptorType::Primitive(ElementType::Float),
        TypeDescriptor::Double => DescriptorType::Primitive(ElementType::Double),
        TypeDescriptor::Boolean => DescriptorType::Primitive(ElementType::Boolean),
        TypeDescriptor::Char => DescriptorType::Primitive(ElementType::Char),
        TypeDescriptor::Void => DescriptorType::Void,
        TypeDescriptor::Object(class) => DescriptorType::Object(class.as_str().replace('/', ".")),
        TypeDescriptor::Array(inner, dimensions) => {
            let mut ty = convert(inner)?;
            for _ in 0..(*dimensions as usize) {
                ty = DescriptorType::Array(Box::new(ty));
            }
            ty
        }
        other => bail!("unsupported descriptor {other:?}"),
    };
    Ok(ty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_return_types() {
        assert_eq!(
            element_return_type("()I").expect("int"),
            DescriptorType::Primitive(ElementType::Int)
        );
        assert_eq!(
            element_return_type("()Ljava/lang/String;").expect("string"),
            DescriptorType::Object("java.lang.String".to_string())
        );
        assert_eq!(
            element_return_type("()[J").expect("long array"),
            DescriptorType::Array(Box::new(DescriptorType::Primitive(ElementType::Long)))
        );
    }

    #[test]
    fn element_with_parameters_is_rejected() {
        let err = element_return_type("(I)I").expect_err("parameters");
        assert_eq!(err.to_string(), "annotation elements take no parameters");
    }

    #[test]
    fn parse_failures_name_the_descriptor() {
        let err = element_return_type("()Q").expect_err("bad descriptor");
        assert!(format!("{err:#}").starts_with("parse method descriptor ()Q"), "{err:#}");
        let err = object_name("[I").expect_err("array");
        assert_eq!(err.to_string(), "not an object descriptor: [I");
    }

    #[test]
    fn class_refs_from_descriptors() {
        assert_eq!(
            class_ref("[[Ljava/lang/String;").expect("class"),
            ClassRef::new("java.lang.String", 2)
        );
        assert_eq!(class_ref("I").expect("int"), ClassRef::new("int", 0));
        assert_eq!(class_ref("V").expect("void"), ClassRef::new("void", 0));
        assert!(class_ref("(I)V").is_err());
        assert!(class_ref("").is_err());
    }

    #[test]
    fn class_ref_descriptor_round_trips() {
        for descriptor in ["Z", "[B", "[[Lp/Q;", "Ljava/lang/Object;"] {
            assert_eq!(class_ref(descriptor).expect("parse").descriptor(), descriptor);
        }
    }

    #[test]
    fn object_names() {
        assert_eq!(object_name("Lp/Color;").expect("object"), "p.Color");
        assert!(object_name("I").is_err());
    }
}
