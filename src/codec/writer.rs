use crate::error::EncodeError;
use crate::types::object_descriptor;
use crate::value::{AnnotationValue, Value};

use super::tag;

/// Big-endian attribute writer.
#[derive(Debug, Default)]
pub(crate) struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub(crate) fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub(crate) fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// u16 count or length prefix.
    pub(crate) fn write_len(&mut self, what: &'static str, len: usize) -> Result<(), EncodeError> {
        let len16 = u16::try_from(len).map_err(|_| EncodeError::TooLong { what, len })?;
        self.write_u16(len16);
        Ok(())
    }

    fn write_utf(&mut self, what: &'static str, text: &str) -> Result<(), EncodeError> {
        self.write_len(what, text.len())?;
        self.buf.extend_from_slice(text.as_bytes());
        Ok(())
    }

    pub(crate) fn write_value(&mut self, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::Byte(v) => {
                self.write_u8(tag::BYTE);
                self.buf.extend_from_slice(&v.to_be_bytes());
            }
            Value::Short(v) => {
                self.write_u8(tag::SHORT);
                self.buf.extend_from_slice(&v.to_be_bytes());
            }
            Value::Int(v) => {
                self.write_u8(tag::INT);
                self.buf.extend_from_slice(&v.to_be_bytes());
            }
            Value::Long(v) => {
                self.write_u8(tag::LONG);
                self.buf.extend_from_slice(&v.to_be_bytes());
            }
            Value::Float(v) => {
                self.write_u8(tag::FLOAT);
                self.write_u32(v.to_bits());
            }
            Value::Double(v) => {
                self.write_u8(tag::DOUBLE);
                self.write_u64(v.to_bits());
            }
            Value::Boolean(v) => {
                self.write_u8(tag::BOOLEAN);
                self.write_u8(u8::from(*v));
            }
            Value::Char(v) => {
                let unit = u16::try_from(u32::from(*v))
                    .map_err(|_| EncodeError::UnencodableChar { value: *v })?;
                self.write_u8(tag::CHAR);
                self.write_u16(unit);
            }
            Value::String(v) => {
                self.write_u8(tag::STRING);
                self.write_utf("string", v)?;
            }
            Value::Class(class) => {
                self.write_u8(tag::CLASS);
                self.write_utf("class descriptor", &class.descriptor())?;
            }
            Value::Enum(constant) => {
                self.write_u8(tag::ENUM);
                self.write_utf("enum descriptor", &object_descriptor(&constant.type_name))?;
                self.write_utf("enum constant", &constant.constant)?;
            }
            Value::Annotation(annotation) => self.write_annotation(annotation)?,
            Value::Array(values) => {
                self.write_u8(tag::ARRAY);
                self.write_len("array", values.len())?;
                for value in values {
                    self.write_value(value)?;
                }
            }
        }
        Ok(())
    }

    /// Pairs are written in name order.
    pub(crate) fn write_annotation(&mut self, annotation: &AnnotationValue) -> Result<(), EncodeError> {
        self.write_u8(tag::ANNOTATION);
        self.write_utf("annotation name", &annotation.annotation_type)?;
        self.write_len("element count", annotation.elements.len())?;
        for (name, value) in &annotation.elements {
            self.write_utf("element name", name)?;
            self.write_value(value)?;
        }
        Ok(())
    }
}
