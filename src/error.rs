//! Error types for literal compilation, the binary codec and projection.

use thiserror::Error;

/// Malformed annotation literal text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected {found} at offset {offset}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        offset: usize,
    },

    #[error("unexpected end of input at offset {offset}, expected {expected}")]
    UnexpectedEof { expected: String, offset: usize },

    #[error("unclosed `{delimiter}` opened at offset {offset}")]
    Unbalanced { delimiter: char, offset: usize },

    #[error("unterminated literal {text} at offset {offset}")]
    Unterminated { text: String, offset: usize },

    #[error("trailing input `{found}` at offset {offset}")]
    TrailingInput { found: String, offset: usize },

    #[error("nesting deeper than {limit} levels at offset {offset}")]
    TooDeep { limit: usize, offset: usize },
}

impl ParseError {
    /// Byte offset in the literal text where the error was detected.
    pub fn offset(&self) -> usize {
        match self {
            ParseError::UnexpectedToken { offset, .. }
            | ParseError::UnexpectedEof { offset, .. }
            | ParseError::Unbalanced { offset, .. }
            | ParseError::Unterminated { offset, .. }
            | ParseError::TrailingInput { offset, .. }
            | ParseError::TooDeep { offset, .. } => *offset,
        }
    }
}

/// A syntactically valid literal that does not match the annotation
/// interface it targets.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("annotation [{annotation}]: {kind}")]
pub struct ValidationError {
    /// Qualified name of the interface being resolved when the error occurred.
    pub annotation: String,
    pub kind: ValidationErrorKind,
    /// Byte offset of the offending node in the literal text.
    pub offset: usize,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationErrorKind {
    #[error("unknown element [{element}]")]
    UnknownElement { element: String },

    #[error("duplicate element [{element}]")]
    DuplicateElement { element: String },

    #[error("element [{element}]: expected [{expected}] was [{found}]")]
    TypeMismatch {
        element: String,
        expected: String,
        found: String,
    },

    #[error("element [{element}]: literal {literal} is out of range for [{expected}]")]
    OutOfRange {
        element: String,
        expected: String,
        literal: String,
    },

    #[error("element [{element}]: invalid [{expected}] literal {literal}")]
    InvalidLiteral {
        element: String,
        expected: String,
        literal: String,
    },

    #[error("element [{element}]: unknown type [{name}]")]
    UnknownType { element: String, name: String },

    #[error("element [{element}]: [{constant}] is not a constant of enum [{enum_type}]")]
    UnknownEnumConstant {
        element: String,
        enum_type: String,
        constant: String,
    },

    #[error("element [{element}]: expected annotation [{expected}] was [{found}]")]
    AnnotationMismatch {
        element: String,
        expected: String,
        found: String,
    },

    #[error("missing value for element [{element}], which has no default")]
    MissingElement { element: String },

    #[error("defaults unavailable: {reason}")]
    DefaultsUnavailable { reason: String },
}

/// Failure to turn one literal into a resolved annotation value. A
/// validation error is the semantic refinement of a parse error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl CompileError {
    pub fn offset(&self) -> usize {
        match self {
            CompileError::Parse(error) => error.offset(),
            CompileError::Validation(error) => error.offset,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, CompileError::Validation(_))
    }
}

/// A resolved value the binary format cannot represent.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("{what} of length {len} exceeds the u16 limit")]
    TooLong { what: &'static str, len: usize },

    #[error("char {value:?} is outside the basic multilingual plane")]
    UnencodableChar { value: char },
}

/// Malformed attribute bytes, or references the loader context cannot
/// satisfy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReaderError {
    #[error("unknown value tag 0x{tag:02x} at offset {offset}")]
    UnknownTag { tag: u8, offset: usize },

    #[error("truncated input at offset {offset}: need {needed} bytes, {remaining} remaining")]
    Truncated {
        offset: usize,
        needed: usize,
        remaining: usize,
    },

    #[error("invalid UTF-8 at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("invalid boolean byte 0x{value:02x} at offset {offset}")]
    InvalidBoolean { value: u8, offset: usize },

    #[error("invalid char code unit 0x{value:04x} at offset {offset}")]
    InvalidChar { value: u16, offset: usize },

    #[error("invalid type descriptor `{descriptor}`")]
    InvalidDescriptor { descriptor: String },

    #[error("{count} trailing bytes after value")]
    TrailingBytes { count: usize },

    #[error("expected an annotation value, found tag 0x{tag:02x}")]
    NotAnnotation { tag: u8 },

    #[error("values nested deeper than {limit} levels")]
    TooDeep { limit: usize },

    #[error("class not found: {name}")]
    ClassNotFound { name: String },

    #[error("enum constant not found: {enum_type}.{constant}")]
    EnumConstantNotFound { enum_type: String, constant: String },

    #[error("annotation interface not found: {name}")]
    InterfaceNotFound { name: String },

    #[error("annotation [{interface}] declares no element [{element}]")]
    UnknownElement { interface: String, element: String },

    #[error("duplicate element [{element}] in annotation [{interface}]")]
    DuplicateElement { interface: String, element: String },

    #[error("element [{interface}.{element}]: expected [{expected}] was [{found}]")]
    TypeMismatch {
        interface: String,
        element: String,
        expected: String,
        found: String,
    },

    #[error("default for [{interface}.{element}]: {reason}")]
    InvalidDefault {
        interface: String,
        element: String,
        reason: String,
    },
}

/// Failure to expose a resolved value through its annotation interface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("annotation interface not found: {name}")]
    InterfaceNotFound { name: String },

    #[error("annotation [{interface}] declares no element [{element}]")]
    UnknownElement { interface: String, element: String },

    #[error("annotation [{interface}] has no value for element [{element}]")]
    IncompleteAnnotation { interface: String, element: String },

    #[error("element [{interface}.{element}]: expected [{expected}] was [{found}]")]
    TypeMismatch {
        interface: String,
        element: String,
        expected: String,
        found: String,
    },
}

/// Invalid type schema supplied by the introspection boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("malformed schema at {path}: {message}")]
    Json { path: String, message: String },

    #[error("duplicate type found: {name}")]
    DuplicateType { name: String },

    #[error("duplicate element [{element}] in annotation [{interface}]")]
    DuplicateElement { interface: String, element: String },

    #[error("element [{interface}.{element}]: invalid descriptor `{descriptor}`: {reason}")]
    InvalidDescriptor {
        interface: String,
        element: String,
        descriptor: String,
        reason: String,
    },

    #[error("element [{interface}.{element}]: unsupported element type `{descriptor}`")]
    UnsupportedElementType {
        interface: String,
        element: String,
        descriptor: String,
    },

    #[error("cyclic annotation element types: {path}")]
    CyclicAnnotation { path: String },

    #[error("element [{interface}.{element}]: invalid default: {reason}")]
    InvalidDefault {
        interface: String,
        element: String,
        reason: String,
    },
}
