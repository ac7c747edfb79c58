//! Resolved annotation values.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::types::{ClassRef, ElementType, EnumRef, simple_name};

/// A fully typed element value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    /// A single UTF-16 code unit; always within the basic multilingual plane.
    Char(char),
    String(String),
    Class(ClassRef),
    Enum(EnumRef),
    Annotation(AnnotationValue),
    Array(Vec<Value>),
}

impl Value {
    /// Kind name used in type mismatch messages.
    pub fn kind_name(&self) -> String {
        match self {
            Value::Byte(_) => "byte".to_string(),
            Value::Short(_) => "short".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Long(_) => "long".to_string(),
            Value::Float(_) => "float".to_string(),
            Value::Double(_) => "double".to_string(),
            Value::Boolean(_) => "boolean".to_string(),
            Value::Char(_) => "char".to_string(),
            Value::String(_) => "java.lang.String".to_string(),
            Value::Class(_) => "java.lang.Class".to_string(),
            Value::Enum(value) => value.type_name.clone(),
            Value::Annotation(value) => value.annotation_type.clone(),
            Value::Array(values) => match values.first() {
                Some(first) => format!("{}[]", first.kind_name()),
                None => "array type".to_string(),
            },
        }
    }

    /// Whether this value is a legal value for an element declared as `ty`.
    pub fn conforms_to(&self, ty: &ElementType) -> bool {
        match (self, ty) {
            (Value::Byte(_), ElementType::Byte)
            | (Value::Short(_), ElementType::Short)
            | (Value::Int(_), ElementType::Int)
            | (Value::Long(_), ElementType::Long)
            | (Value::Float(_), ElementType::Float)
            | (Value::Double(_), ElementType::Double)
            | (Value::Boolean(_), ElementType::Boolean)
            | (Value::Char(_), ElementType::Char)
            | (Value::String(_), ElementType::String)
            | (Value::Class(_), ElementType::Class) => true,
            (Value::Enum(value), ElementType::Enum(name)) => value.type_name == *name,
            (Value::Annotation(value), ElementType::Annotation(name)) => {
                value.annotation_type == *name
            }
            (Value::Array(values), ElementType::Array(inner)) => {
                values.iter().all(|value| value.conforms_to(inner))
            }
            _ => false,
        }
    }
}

/// One resolved annotation occurrence: interface name plus element values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotationValue {
    pub annotation_type: String,
    pub elements: BTreeMap<String, Value>,
}

impl AnnotationValue {
    pub fn new(annotation_type: impl Into<String>) -> Self {
        Self {
            annotation_type: annotation_type.into(),
            elements: BTreeMap::new(),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, element: impl Into<String>, value: Value) -> Self {
        self.elements.insert(element.into(), value);
        self
    }

    pub fn insert(&mut self, element: impl Into<String>, value: Value) -> Option<Value> {
        self.elements.insert(element.into(), value)
    }

    pub fn get(&self, element: &str) -> Option<&Value> {
        self.elements.get(element)
    }

    pub fn contains(&self, element: &str) -> bool {
        self.elements.contains_key(element)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn simple_name(&self) -> &str {
        simple_name(&self.annotation_type)
    }

    /// Whether `name` refers to this annotation, by qualified or simple name.
    pub fn is_named(&self, name: &str) -> bool {
        self.annotation_type == name || self.simple_name() == name
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Byte(value) => write!(f, "{value}"),
            Value::Short(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Long(value) => write!(f, "{value}L"),
            Value::Float(value) => write!(f, "{value:?}f"),
            Value::Double(value) => write!(f, "{value:?}"),
            Value::Boolean(value) => write!(f, "{value}"),
            Value::Char(value) => write_quoted(f, '\'', std::iter::once(*value)),
            Value::String(value) => write_quoted(f, '"', value.chars()),
            Value::Class(value) => write!(f, "{value}.class"),
            Value::Enum(value) => write!(f, "{value}"),
            Value::Annotation(value) => write!(f, "{value}"),
            Value::Array(values) => {
                f.write_str("{")?;
                for (index, value) in values.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

/// Java source escapes; control characters become `\uXXXX`.
fn write_quoted(
    f: &mut fmt::Formatter<'_>,
    quote: char,
    chars: impl Iterator<Item = char>,
) -> fmt::Result {
    use fmt::Write;

    f.write_char(quote)?;
    for c in chars {
        match c {
            '\u{8}' => f.write_str("\\b")?,
            '\t' => f.write_str("\\t")?,
            '\n' => f.write_str("\\n")?,
            '\u{c}' => f.write_str("\\f")?,
            '\r' => f.write_str("\\r")?,
            '\\' => f.write_str("\\\\")?,
            c if c == quote => write!(f, "\\{c}")?,
            c if c.is_control() => {
                let mut buf = [0u16; 2];
                for unit in c.encode_utf16(&mut buf) {
                    write!(f, "\\u{unit:04x}")?;
                }
            }
            c => f.write_char(c)?,
        }
    }
    f.write_char(quote)
}

impl fmt::Display for AnnotationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}(", self.annotation_type)?;
        for (index, (name, value)) in self.elements.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str(")")
    }
}
