//! Binary attribute codec for resolved annotation values.
//!
//! Every value is a one-byte tag followed by a big-endian payload; lengths
//! and counts are `u16`. An annotation is its qualified interface name plus
//! `(name, value)` pairs in name order, so equal values always encode to
//! equal bytes.

mod reader;
mod writer;

use tracing::debug;

use crate::defaults::LoaderContext;
use crate::error::{EncodeError, ReaderError};
use crate::value::{AnnotationValue, Value};

use self::reader::Reader;
use self::writer::Writer;

/// Name of the member attribute holding every annotation of one member.
pub const ATTRIBUTE_NAME: &str = "org.codehaus.backport175.Annotations";

/// Maximum nesting of annotations and arrays accepted by the decoder.
pub const MAX_DEPTH: usize = 256;

pub(crate) mod tag {
    pub const BYTE: u8 = b'B';
    pub const SHORT: u8 = b'S';
    pub const INT: u8 = b'I';
    pub const LONG: u8 = b'J';
    pub const FLOAT: u8 = b'F';
    pub const DOUBLE: u8 = b'D';
    pub const BOOLEAN: u8 = b'Z';
    pub const CHAR: u8 = b'C';
    pub const STRING: u8 = b's';
    pub const CLASS: u8 = b'c';
    pub const ENUM: u8 = b'e';
    pub const ANNOTATION: u8 = b'@';
    pub const ARRAY: u8 = b'[';
}

/// Encode one annotation as an ANNOTATION value.
pub fn encode(annotation: &AnnotationValue) -> Result<Vec<u8>, EncodeError> {
    let mut writer = Writer::new();
    writer.write_annotation(annotation)?;
    Ok(writer.into_bytes())
}

/// Encode one element value. This is also the default-value attribute
/// format.
pub fn encode_value(value: &Value) -> Result<Vec<u8>, EncodeError> {
    let mut writer = Writer::new();
    writer.write_value(value)?;
    Ok(writer.into_bytes())
}

/// Encode the annotations of one member: a `u16` count followed by that
/// many ANNOTATION values.
pub fn encode_member_attribute(annotations: &[AnnotationValue]) -> Result<Vec<u8>, EncodeError> {
    let mut writer = Writer::new();
    writer.write_len("annotation count", annotations.len())?;
    for annotation in annotations {
        writer.write_annotation(annotation)?;
    }
    Ok(writer.into_bytes())
}

/// Decode bytes written by [`encode`], completing omitted elements from the
/// interface defaults.
pub fn decode(bytes: &[u8], context: &LoaderContext<'_>) -> Result<AnnotationValue, ReaderError> {
    let mut reader = Reader::new(bytes, context);
    let annotation = read_annotation(&mut reader)?;
    reader.finish()?;
    Ok(annotation)
}

/// Decode bytes written by [`encode_value`].
pub fn decode_value(bytes: &[u8], context: &LoaderContext<'_>) -> Result<Value, ReaderError> {
    let mut reader = Reader::new(bytes, context);
    let value = reader.read_value()?;
    reader.finish()?;
    Ok(value)
}

/// Decode bytes written by [`encode_member_attribute`].
pub fn decode_member_attribute(
    bytes: &[u8],
    context: &LoaderContext<'_>,
) -> Result<Vec<AnnotationValue>, ReaderError> {
    let mut reader = Reader::new(bytes, context);
    let count = reader.read_u16()?;
    let mut annotations = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        annotations.push(read_annotation(&mut reader)?);
    }
    reader.finish()?;
    debug!(count = annotations.len(), "decoded member attribute");
    Ok(annotations)
}

fn read_annotation(reader: &mut Reader<'_, '_>) -> Result<AnnotationValue, ReaderError> {
    match reader.read_u8()? {
        tag::ANNOTATION => reader.read_annotation_body(),
        other => Err(ReaderError::NotAnnotation { tag: other }),
    }
}
