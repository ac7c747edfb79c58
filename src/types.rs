//! Declared element types and type references.

use std::fmt;

use serde::Serialize;

/// Declared return type of an annotation element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementType {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Boolean,
    Char,
    String,
    Class,
    /// Enum type, by qualified name.
    Enum(String),
    /// Nested annotation interface, by qualified name.
    Annotation(String),
    Array(Box<ElementType>),
}

impl ElementType {
    pub fn is_array(&self) -> bool {
        matches!(self, ElementType::Array(_))
    }

    /// Annotation interface referenced by this type, looking through arrays.
    pub fn referenced_annotation(&self) -> Option<&str> {
        match self {
            ElementType::Annotation(name) => Some(name),
            ElementType::Array(inner) => inner.referenced_annotation(),
            _ => None,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Byte => f.write_str("byte"),
            ElementType::Short => f.write_str("short"),
            ElementType::Int => f.write_str("int"),
            ElementType::Long => f.write_str("long"),
            ElementType::Float => f.write_str("float"),
            ElementType::Double => f.write_str("double"),
            ElementType::Boolean => f.write_str("boolean"),
            ElementType::Char => f.write_str("char"),
            ElementType::String => f.write_str("java.lang.String"),
            ElementType::Class => f.write_str("java.lang.Class"),
            ElementType::Enum(name) | ElementType::Annotation(name) => f.write_str(name),
            ElementType::Array(inner) => write!(f, "{inner}[]"),
        }
    }
}

pub(crate) const PRIMITIVE_NAMES: [&str; 9] = [
    "boolean", "byte", "char", "short", "int", "long", "float", "double", "void",
];

/// Class literal: a base type (qualified class name, primitive keyword or
/// `void`) plus array dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ClassRef {
    pub name: String,
    pub dimensions: u8,
}

impl ClassRef {
    pub fn new(name: impl Into<String>, dimensions: u8) -> Self {
        Self {
            name: name.into(),
            dimensions,
        }
    }

    pub fn is_primitive(&self) -> bool {
        PRIMITIVE_NAMES.contains(&self.name.as_str())
    }

    /// JVM field descriptor, e.g. `[[Ljava/lang/String;` or `I`.
    pub fn descriptor(&self) -> String {
        let mut descriptor = "[".repeat(usize::from(self.dimensions));
        match self.name.as_str() {
            "boolean" => descriptor.push('Z'),
            "byte" => descriptor.push('B'),
            "char" => descriptor.push('C'),
            "short" => descriptor.push('S'),
            "int" => descriptor.push('I'),
            "long" => descriptor.push('J'),
            "float" => descriptor.push('F'),
            "double" => descriptor.push('D'),
            "void" => descriptor.push('V'),
            name => descriptor.push_str(&object_descriptor(name)),
        }
        descriptor
    }
}

impl fmt::Display for ClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for _ in 0..self.dimensions {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

/// Enum constant reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EnumRef {
    pub type_name: String,
    pub constant: String,
}

impl EnumRef {
    pub fn new(type_name: impl Into<String>, constant: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            constant: constant.into(),
        }
    }
}

impl fmt::Display for EnumRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.constant)
    }
}

/// `com.example.Foo` -> `Lcom/example/Foo;`
pub(crate) fn object_descriptor(qualified_name: &str) -> String {
    format!("L{};", qualified_name.replace('.', "/"))
}

/// Last segment of a dotted name.
pub(crate) fn simple_name(qualified_name: &str) -> &str {
    qualified_name
        .rsplit_once('.')
        .map_or(qualified_name, |(_, simple)| simple)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_ref_descriptors() {
        assert_eq!(ClassRef::new("java.lang.String", 0).descriptor(), "Ljava/lang/String;");
        assert_eq!(ClassRef::new("int", 2).descriptor(), "[[I");
        assert_eq!(ClassRef::new("void", 0).descriptor(), "V");
        assert_eq!(ClassRef::new("a.B", 1).to_string(), "a.B[]");
    }

    #[test]
    fn element_type_display() {
        let ty = ElementType::Array(Box::new(ElementType::Long));
        assert_eq!(ty.to_string(), "long[]");
        assert_eq!(ElementType::Int.to_string(), "int");
        assert_eq!(ElementType::Enum("p.Color".into()).to_string(), "p.Color");
    }

    #[test]
    fn referenced_annotation_looks_through_arrays() {
        let ty = ElementType::Array(Box::new(ElementType::Annotation("p.A".into())));
        assert_eq!(ty.referenced_annotation(), Some("p.A"));
        assert_eq!(ElementType::Int.referenced_annotation(), None);
    }

    #[test]
    fn simple_name_of_dotted_and_bare_names() {
        assert_eq!(simple_name("a.b.Simple"), "Simple");
        assert_eq!(simple_name("Simple"), "Simple");
    }
}
