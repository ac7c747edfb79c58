//! Annotation literals for JVM code compiled without native annotations.
//!
//! Literal text such as `@Simple(val="foo", s="bar")` is parsed, resolved
//! against the annotation interface it names and encoded into a class-file
//! attribute. The attribute decodes back into the same [`AnnotationValue`],
//! with omitted elements completed from the interface defaults.

pub mod ast;
pub mod classpath;
pub mod codec;
pub mod compiler;
pub mod defaults;
mod descriptor;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod projection;
pub mod report;
pub mod resolver;
pub mod scan;
pub mod telemetry;
pub mod types;
pub mod value;

#[cfg(test)]
mod test_harness;

pub use classpath::{ClasspathIndex, DefaultsSource, TypeLookup};
pub use compiler::{
    AttributeSink, BatchSummary, CollectingSink, CompiledAttribute, Diagnostic, DiagnosticCode,
    MemberRef, MessageSink, Occurrence, TracingSink, compile_batch, compile_literal,
};
pub use defaults::{DefaultsRegistry, LoaderContext, ModuleToken};
pub use error::{
    CompileError, EncodeError, ParseError, ProjectionError, ReaderError, SchemaError,
    ValidationError, ValidationErrorKind,
};
pub use projection::{AnnotationInstance, FromValue, MemberAnnotations};
pub use resolver::Resolver;
pub use types::{ClassRef, ElementType, EnumRef};
pub use value::{AnnotationValue, Value};
