use std::collections::BTreeMap;

use crate::defaults::LoaderContext;
use crate::descriptor::{class_ref, object_name};
use crate::error::ReaderError;
use crate::types::{ClassRef, EnumRef};
use crate::value::{AnnotationValue, Value};

use super::{MAX_DEPTH, tag};

/// Cursor over attribute bytes that loads referenced types through a
/// [`LoaderContext`].
pub(crate) struct Reader<'b, 'c> {
    bytes: &'b [u8],
    pos: usize,
    context: &'b LoaderContext<'c>,
    depth: usize,
}

impl<'b, 'c> Reader<'b, 'c> {
    pub(crate) fn new(bytes: &'b [u8], context: &'b LoaderContext<'c>) -> Self {
        Self {
            bytes,
            pos: 0,
            context,
            depth: 0,
        }
    }

    pub(crate) fn finish(&self) -> Result<(), ReaderError> {
        let count = self.bytes.len() - self.pos;
        if count > 0 {
            return Err(ReaderError::TrailingBytes { count });
        }
        Ok(())
    }

    fn take(&mut self, needed: usize) -> Result<&'b [u8], ReaderError> {
        let remaining = self.bytes.len() - self.pos;
        if needed > remaining {
            return Err(ReaderError::Truncated {
                offset: self.pos,
                needed,
                remaining,
            });
        }
        let slice = &self.bytes[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], ReaderError> {
        let slice = self.take(N)?;
        let mut array = [0u8; N];
        array.copy_from_slice(slice);
        Ok(array)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, ReaderError> {
        Ok(self.take_array::<1>()?[0])
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, ReaderError> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    fn read_utf(&mut self) -> Result<String, ReaderError> {
        let len = usize::from(self.read_u16()?);
        let offset = self.pos;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| ReaderError::InvalidUtf8 { offset })
    }

    pub(crate) fn read_value(&mut self) -> Result<Value, ReaderError> {
        let offset = self.pos;
        let kind = self.read_u8()?;
        let value = match kind {
            tag::BYTE => Value::Byte(i8::from_be_bytes(self.take_array()?)),
            tag::SHORT => Value::Short(i16::from_be_bytes(self.take_array()?)),
            tag::INT => Value::Int(i32::from_be_bytes(self.take_array()?)),
            tag::LONG => Value::Long(i64::from_be_bytes(self.take_array()?)),
            tag::FLOAT => Value::Float(f32::from_bits(u32::from_be_bytes(self.take_array()?))),
            tag::DOUBLE => Value::Double(f64::from_bits(u64::from_be_bytes(self.take_array()?))),
            tag::BOOLEAN => {
                let offset = self.pos;
                match self.read_u8()? {
                    0 => Value::Boolean(false),
                    1 => Value::Boolean(true),
                    value => return Err(ReaderError::InvalidBoolean { value, offset }),
                }
            }
            tag::CHAR => {
                let offset = self.pos;
                let unit = self.read_u16()?;
                let value = char::from_u32(u32::from(unit))
                    .ok_or(ReaderError::InvalidChar { value: unit, offset })?;
                Value::Char(value)
            }
            tag::STRING => Value::String(self.read_utf()?),
            tag::CLASS => Value::Class(self.read_class()?),
            tag::ENUM => Value::Enum(self.read_enum()?),
            tag::ANNOTATION => Value::Annotation(self.read_annotation_body()?),
            tag::ARRAY => {
                self.enter()?;
                let count = usize::from(self.read_u16()?);
                let mut values = Vec::with_capacity(count.min(self.bytes.len() - self.pos));
                for _ in 0..count {
                    values.push(self.read_value()?);
                }
                self.depth -= 1;
                Value::Array(values)
            }
            other => return Err(ReaderError::UnknownTag { tag: other, offset }),
        };
        Ok(value)
    }

    fn read_class(&mut self) -> Result<ClassRef, ReaderError> {
        let descriptor = self.read_utf()?;
        let class = class_ref(&descriptor)
            .map_err(|_| ReaderError::InvalidDescriptor { descriptor })?;
        if !class.is_primitive() && !self.context.types().is_class(&class.name) {
            return Err(ReaderError::ClassNotFound { name: class.name });
        }
        Ok(class)
    }

    fn read_enum(&mut self) -> Result<EnumRef, ReaderError> {
        let descriptor = self.read_utf()?;
        let constant = self.read_utf()?;
        let type_name =
            object_name(&descriptor).map_err(|_| ReaderError::InvalidDescriptor { descriptor })?;
        let Some(enum_type) = self.context.types().enumeration(&type_name) else {
            return Err(ReaderError::ClassNotFound { name: type_name });
        };
        if !enum_type.has_constant(&constant) {
            return Err(ReaderError::EnumConstantNotFound {
                enum_type: type_name,
                constant,
            });
        }
        Ok(EnumRef::new(type_name, constant))
    }

    /// Reads the payload following an ANNOTATION tag and completes omitted
    /// elements from the interface defaults.
    pub(crate) fn read_annotation_body(&mut self) -> Result<AnnotationValue, ReaderError> {
        self.enter()?;
        let name = self.read_utf()?;
        let types = self.context.types();
        let interface = types
            .annotation(&name)
            .ok_or_else(|| ReaderError::InterfaceNotFound { name: name.clone() })?;

        let count = self.read_u16()?;
        let mut elements = BTreeMap::new();
        for _ in 0..count {
            let element_name = self.read_utf()?;
            let value = self.read_value()?;
            let Some(element) = interface.element(&element_name) else {
                return Err(ReaderError::UnknownElement {
                    interface: name,
                    element: element_name,
                });
            };
            if !value.conforms_to(&element.ty) {
                return Err(ReaderError::TypeMismatch {
                    interface: name,
                    element: element_name,
                    expected: element.ty.to_string(),
                    found: value.kind_name(),
                });
            }
            if elements.insert(element_name.clone(), value).is_some() {
                return Err(ReaderError::DuplicateElement {
                    interface: name,
                    element: element_name,
                });
            }
        }

        if elements.len() < interface.elements.len() {
            let defaults = self.context.defaults_for(interface)?;
            for (element_name, value) in &defaults.elements {
                elements
                    .entry(element_name.clone())
                    .or_insert_with(|| value.clone());
            }
        }
        self.depth -= 1;

        Ok(AnnotationValue {
            annotation_type: name,
            elements,
        })
    }

    fn enter(&mut self) -> Result<(), ReaderError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ReaderError::TooDeep { limit: MAX_DEPTH });
        }
        Ok(())
    }
}
