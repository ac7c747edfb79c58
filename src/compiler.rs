//! Batch compilation of annotation literals into member attributes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

use rayon::prelude::*;
use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, error, info, info_span};

use crate::codec::{self, ATTRIBUTE_NAME};
use crate::defaults::LoaderContext;
use crate::error::CompileError;
use crate::parser::parse;
use crate::resolver::Resolver;
use crate::value::AnnotationValue;

/// Member of a class an annotation is attached to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemberRef {
    #[default]
    Class,
    Field {
        name: String,
    },
    Method {
        name: String,
        descriptor: String,
    },
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberRef::Class => f.write_str("<class>"),
            MemberRef::Field { name } => f.write_str(name),
            MemberRef::Method { name, descriptor } => write!(f, "{name}{descriptor}"),
        }
    }
}

/// One raw literal found by the source scanner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub class_name: String,
    pub file: String,
    pub line: u32,
    #[serde(default)]
    pub member: MemberRef,
    pub literal: String,
}

/// Metadata describing a diagnostic kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiagnosticCode {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

impl DiagnosticCode {
    pub const PARSE_ERROR: DiagnosticCode = DiagnosticCode {
        id: "BP175_PARSE_ERROR",
        name: "Malformed annotation literal",
        description: "The annotation literal does not match the literal grammar.",
    };
    pub const VALIDATION_ERROR: DiagnosticCode = DiagnosticCode {
        id: "BP175_VALIDATION_ERROR",
        name: "Invalid annotation value",
        description: "The annotation literal does not match its annotation interface.",
    };
    pub const DUPLICATE_ANNOTATION: DiagnosticCode = DiagnosticCode {
        id: "BP175_DUPLICATE_ANNOTATION",
        name: "Duplicate annotation",
        description: "The same annotation type is attached to one member more than once.",
    };
    pub const ENCODE_ERROR: DiagnosticCode = DiagnosticCode {
        id: "BP175_ENCODE_ERROR",
        name: "Unencodable annotation",
        description: "The resolved annotation exceeds the limits of the attribute format.",
    };

    pub const ALL: [DiagnosticCode; 4] = [
        Self::PARSE_ERROR,
        Self::VALIDATION_ERROR,
        Self::DUPLICATE_ANNOTATION,
        Self::ENCODE_ERROR,
    ];
}

/// A failed occurrence, located the way a compiler reports errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub class_name: String,
    pub file: String,
    pub line: u32,
    pub member: MemberRef,
    /// Qualified name of the annotation, when it was resolved far enough.
    pub annotation: Option<String>,
    pub message: String,
}

impl Diagnostic {
    fn new(code: DiagnosticCode, occurrence: &Occurrence, annotation: Option<String>, message: String) -> Self {
        Self {
            code,
            class_name: occurrence.class_name.clone(),
            file: occurrence.file.clone(),
            line: occurrence.line,
            member: occurrence.member.clone(),
            annotation,
            message,
        }
    }

    fn from_compile_error(occurrence: &Occurrence, error: &CompileError) -> Self {
        match error {
            CompileError::Parse(err) => {
                Self::new(DiagnosticCode::PARSE_ERROR, occurrence, None, err.to_string())
            }
            CompileError::Validation(err) => Self::new(
                DiagnosticCode::VALIDATION_ERROR,
                occurrence,
                Some(err.annotation.clone()),
                format!("{err} at offset {}", err.offset),
            ),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: error in class [{}] member [{}]: {}",
            self.file, self.line, self.class_name, self.member, self.message
        )
    }
}

/// Receives compile-time messages, in input order, from the thread driving
/// the batch.
pub trait MessageSink: Sync {
    fn info(&self, message: &str);
    fn error(&self, diagnostic: &Diagnostic);
    fn accept(&self, occurrence: &Occurrence, annotation: &AnnotationValue);
}

/// Forwards messages to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl MessageSink for TracingSink {
    fn info(&self, message: &str) {
        info!("{message}");
    }

    fn error(&self, diagnostic: &Diagnostic) {
        error!(code = diagnostic.code.id, "{diagnostic}");
    }

    fn accept(&self, occurrence: &Occurrence, annotation: &AnnotationValue) {
        debug!(
            class = %occurrence.class_name,
            member = %occurrence.member,
            "accepted {annotation}"
        );
    }
}

/// Keeps every message, for callers that report after the batch.
#[derive(Debug, Default)]
pub struct CollectingSink {
    infos: Mutex<Vec<String>>,
    errors: Mutex<Vec<Diagnostic>>,
    accepted: Mutex<Vec<AnnotationValue>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn infos(&self) -> Vec<String> {
        lock(&self.infos).clone()
    }

    pub fn errors(&self) -> Vec<Diagnostic> {
        lock(&self.errors).clone()
    }

    pub fn accepted(&self) -> Vec<AnnotationValue> {
        lock(&self.accepted).clone()
    }
}

impl MessageSink for CollectingSink {
    fn info(&self, message: &str) {
        lock(&self.infos).push(message.to_string());
    }

    fn error(&self, diagnostic: &Diagnostic) {
        lock(&self.errors).push(diagnostic.clone());
    }

    fn accept(&self, _occurrence: &Occurrence, annotation: &AnnotationValue) {
        lock(&self.accepted).push(annotation.clone());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Write path of the bytecode container.
pub trait AttributeSink {
    fn attach(&mut self, class_name: &str, member: &MemberRef, name: &str, bytes: Vec<u8>);
}

/// An attribute ready to be written into a class file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CompiledAttribute {
    pub class_name: String,
    pub member: MemberRef,
    pub attribute: String,
    #[serde(serialize_with = "serialize_hex")]
    pub bytes: Vec<u8>,
}

fn serialize_hex<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}

impl AttributeSink for Vec<CompiledAttribute> {
    fn attach(&mut self, class_name: &str, member: &MemberRef, name: &str, bytes: Vec<u8>) {
        self.push(CompiledAttribute {
            class_name: class_name.to_string(),
            member: member.clone(),
            attribute: name.to_string(),
            bytes,
        });
    }
}

/// Counts reported by [`compile_batch`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub occurrences: usize,
    pub accepted: usize,
    pub failed: usize,
    /// Literals whose name is not an annotation interface.
    pub skipped: usize,
    pub attributes: usize,
}

impl BatchSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Parse and resolve one literal. `Ok(None)` means the literal names no
/// annotation interface.
pub fn compile_literal(
    literal: &str,
    resolver: &Resolver<'_>,
) -> Result<Option<AnnotationValue>, CompileError> {
    let root = parse(literal)?;
    Ok(resolver.resolve(&root)?)
}

enum Outcome {
    Resolved(AnnotationValue),
    NotAnnotation(String),
    Failed(Diagnostic),
}

/// Compile every occurrence, reporting through `messages`, and attach one
/// annotations attribute per member that accepted at least one annotation.
///
/// Occurrences resolve in parallel. Grouping, duplicate detection and
/// attachment run in input order, so output is deterministic. A failed
/// occurrence attaches nothing and does not affect the others.
pub fn compile_batch(
    occurrences: &[Occurrence],
    context: LoaderContext<'_>,
    messages: &dyn MessageSink,
    attributes: &mut dyn AttributeSink,
) -> BatchSummary {
    let span = info_span!("compile_batch", occurrences = occurrences.len());
    let _entered = span.enter();
    let resolver = Resolver::new(context);

    let outcomes: Vec<Outcome> = occurrences
        .par_iter()
        .map(|occurrence| compile_occurrence(occurrence, &resolver))
        .collect();

    let mut summary = BatchSummary {
        occurrences: occurrences.len(),
        ..BatchSummary::default()
    };
    let mut members: BTreeMap<(String, MemberRef), (&Occurrence, Vec<AnnotationValue>)> =
        BTreeMap::new();
    for (occurrence, outcome) in occurrences.iter().zip(outcomes) {
        match outcome {
            Outcome::Resolved(annotation) => {
                let key = (occurrence.class_name.clone(), occurrence.member.clone());
                let (_, attached) = members.entry(key).or_insert_with(|| (occurrence, Vec::new()));
                if attached
                    .iter()
                    .any(|existing| existing.annotation_type == annotation.annotation_type)
                {
                    summary.failed += 1;
                    messages.error(&Diagnostic::new(
                        DiagnosticCode::DUPLICATE_ANNOTATION,
                        occurrence,
                        Some(annotation.annotation_type.clone()),
                        format!("duplicate annotation [{}]", annotation.annotation_type),
                    ));
                    continue;
                }
                summary.accepted += 1;
                messages.accept(occurrence, &annotation);
                attached.push(annotation);
            }
            Outcome::NotAnnotation(name) => {
                summary.skipped += 1;
                messages.info(&format!(
                    "annotation not found: {name} ({}:{})",
                    occurrence.file, occurrence.line
                ));
            }
            Outcome::Failed(diagnostic) => {
                summary.failed += 1;
                messages.error(&diagnostic);
            }
        }
    }

    for ((class_name, member), (first, annotations)) in members {
        match codec::encode_member_attribute(&annotations) {
            Ok(bytes) => {
                attributes.attach(&class_name, &member, ATTRIBUTE_NAME, bytes);
                summary.attributes += 1;
            }
            Err(err) => {
                summary.accepted -= annotations.len();
                summary.failed += annotations.len();
                messages.error(&Diagnostic::new(
                    DiagnosticCode::ENCODE_ERROR,
                    first,
                    None,
                    err.to_string(),
                ));
            }
        }
    }

    info!(
        accepted = summary.accepted,
        failed = summary.failed,
        skipped = summary.skipped,
        attributes = summary.attributes,
        "compiled annotation literals"
    );
    summary
}

fn compile_occurrence(occurrence: &Occurrence, resolver: &Resolver<'_>) -> Outcome {
    let name = leading_name(&occurrence.literal);
    if !name.is_empty() && resolver.context().types().find_annotation(name).is_none() {
        return Outcome::NotAnnotation(name.to_string());
    }
    match compile_literal(&occurrence.literal, resolver) {
        Ok(Some(annotation)) => Outcome::Resolved(annotation),
        Ok(None) => Outcome::NotAnnotation(name.to_string()),
        Err(err) => Outcome::Failed(Diagnostic::from_compile_error(occurrence, &err)),
    }
}

/// Annotation name at the start of a literal, after an optional `@`.
/// Doc tags such as `param name the text` yield `param`.
fn leading_name(literal: &str) -> &str {
    let literal = literal.trim_start();
    let literal = literal.strip_prefix('@').unwrap_or(literal).trim_start();
    let end = literal
        .find(|c: char| !(c.is_alphanumeric() || matches!(c, '_' | '$' | '.')))
        .unwrap_or(literal.len());
    literal[..end].trim_end_matches('.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_member_attribute;
    use crate::test_harness::TestHarness;
    use crate::value::Value;

    fn occurrence(member: MemberRef, line: u32, literal: &str) -> Occurrence {
        Occurrence {
            class_name: "com.example.Service".to_string(),
            file: "Service.java".to_string(),
            line,
            member,
            literal: literal.to_string(),
        }
    }

    fn method(name: &str) -> MemberRef {
        MemberRef::Method {
            name: name.to_string(),
            descriptor: "()V".to_string(),
        }
    }

    #[test]
    fn failed_occurrences_do_not_block_others() {
        let harness = TestHarness::new();
        let occurrences = vec![
            occurrence(method("run"), 10, r#"Simple(val="foo", s="bar")"#),
            occurrence(method("run"), 11, "IntAnno(java.lang.String.class)"),
            occurrence(method("stop"), 20, "IntAnno(1"),
            occurrence(method("stop"), 21, "param name the name"),
            occurrence(method("stop"), 22, "author"),
            occurrence(MemberRef::Class, 1, "DefaultInt"),
        ];
        let sink = CollectingSink::new();
        let mut attributes: Vec<CompiledAttribute> = Vec::new();
        let summary = compile_batch(&occurrences, harness.context(), &sink, &mut attributes);

        assert_eq!(summary.occurrences, 6);
        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.attributes, 2);
        assert!(summary.has_failures());

        let errors = sink.errors();
        let codes: Vec<&str> = errors.iter().map(|error| error.code.id).collect();
        assert_eq!(
            codes,
            vec![
                DiagnosticCode::VALIDATION_ERROR.id,
                DiagnosticCode::PARSE_ERROR.id,
            ]
        );
        assert_eq!(errors[0].line, 11);
        assert_eq!(errors[0].annotation.as_deref(), Some("test.IntAnno"));
        assert!(errors[0].message.contains("expected [int] was [Class]"));
        assert_eq!(errors[1].line, 20);
        assert_eq!(
            sink.infos(),
            vec![
                "annotation not found: param (Service.java:21)",
                "annotation not found: author (Service.java:22)",
            ]
        );

        let members: Vec<&MemberRef> = attributes.iter().map(|attribute| &attribute.member).collect();
        assert_eq!(members, vec![&MemberRef::Class, &method("run")]);
        assert!(attributes.iter().all(|attribute| attribute.attribute == ATTRIBUTE_NAME));
    }

    #[test]
    fn doc_tags_with_free_text_are_skipped() {
        let harness = TestHarness::new();
        let occurrences = vec![
            occurrence(method("run"), 2, "@author Jane Doe"),
            occurrence(method("run"), 3, "  @since 1.0"),
            occurrence(method("run"), 4, "return the result, or {@code null}"),
            occurrence(method("run"), 5, "@IntAnno(7)"),
        ];
        let sink = CollectingSink::new();
        let mut attributes: Vec<CompiledAttribute> = Vec::new();
        let summary = compile_batch(&occurrences, harness.context(), &sink, &mut attributes);
        assert_eq!(summary.skipped, 3);
        assert_eq!(summary.accepted, 1);
        assert!(!summary.has_failures());
        assert!(sink.errors().is_empty());
        assert_eq!(attributes.len(), 1);
    }

    #[test]
    fn unencodable_member_reports_at_its_first_occurrence() {
        let harness = TestHarness::new();
        let long = "x".repeat(usize::from(u16::MAX) + 1);
        let occurrences = vec![
            occurrence(method("run"), 8, "IntAnno(1)"),
            occurrence(method("run"), 9, &format!(r#"Simple(val = "{long}", s = "s")"#)),
            occurrence(method("stop"), 12, "IntAnno(2)"),
        ];
        let sink = CollectingSink::new();
        let mut attributes: Vec<CompiledAttribute> = Vec::new();
        let summary = compile_batch(&occurrences, harness.context(), &sink, &mut attributes);
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.attributes, 1);
        assert_eq!(attributes[0].member, method("stop"));

        let errors = sink.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, DiagnosticCode::ENCODE_ERROR);
        assert_eq!(errors[0].file, "Service.java");
        assert_eq!(errors[0].line, 8);
        assert!(errors[0].message.contains("string of length 65536 exceeds the u16 limit"));
    }

    #[test]
    fn leading_names_skip_the_at_sign() {
        assert_eq!(leading_name("@author Jane"), "author");
        assert_eq!(leading_name(" test.IntAnno(1)"), "test.IntAnno");
        assert_eq!(leading_name("Marker"), "Marker");
        assert_eq!(leading_name("(1)"), "");
    }

    #[test]
    fn duplicate_element_attaches_nothing() {
        let harness = TestHarness::new();
        let occurrences = vec![occurrence(method("run"), 3, "IntAnno(value = 1, value = 2)")];
        let sink = CollectingSink::new();
        let mut attributes: Vec<CompiledAttribute> = Vec::new();
        let summary = compile_batch(&occurrences, harness.context(), &sink, &mut attributes);
        assert_eq!(summary.failed, 1);
        assert!(attributes.is_empty());
        assert!(sink.errors()[0].message.contains("duplicate element [value]"));
    }

    #[test]
    fn duplicate_annotation_keeps_the_first() {
        let harness = TestHarness::new();
        let occurrences = vec![
            occurrence(method("run"), 3, "IntAnno(1)"),
            occurrence(method("run"), 4, "test.IntAnno(2)"),
            occurrence(method("stop"), 5, "IntAnno(3)"),
        ];
        let sink = CollectingSink::new();
        let mut attributes: Vec<CompiledAttribute> = Vec::new();
        let summary = compile_batch(&occurrences, harness.context(), &sink, &mut attributes);
        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.failed, 1);
        let errors = sink.errors();
        assert_eq!(errors[0].code, DiagnosticCode::DUPLICATE_ANNOTATION);
        assert_eq!(errors[0].line, 4);

        let run = attributes
            .iter()
            .find(|attribute| attribute.member == method("run"))
            .expect("run attribute");
        let decoded = decode_member_attribute(&run.bytes, &harness.context()).expect("decode");
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].get("value"), Some(&Value::Int(1)));
    }

    #[test]
    fn member_attribute_holds_every_annotation() {
        let harness = TestHarness::new();
        let occurrences = vec![
            occurrence(MemberRef::Class, 1, "IntAnno(1)"),
            occurrence(MemberRef::Class, 2, r#"Simple(val = "a", s = "b")"#),
            occurrence(MemberRef::Class, 3, "Long(v = 1, arr = {})"),
        ];
        let sink = CollectingSink::new();
        let mut attributes: Vec<CompiledAttribute> = Vec::new();
        compile_batch(&occurrences, harness.context(), &sink, &mut attributes);
        assert_eq!(attributes.len(), 1);
        let decoded = decode_member_attribute(&attributes[0].bytes, &harness.context()).expect("decode");
        let names: Vec<&str> = decoded.iter().map(|anno| anno.annotation_type.as_str()).collect();
        assert_eq!(names, vec!["test.IntAnno", "test.Simple", "test.Long"]);
        assert_eq!(sink.accepted().len(), 3);
    }

    #[test]
    fn compiled_attributes_serialize_bytes_as_hex() {
        let attribute = CompiledAttribute {
            class_name: "a.B".to_string(),
            member: MemberRef::Field {
                name: "f".to_string(),
            },
            attribute: ATTRIBUTE_NAME.to_string(),
            bytes: vec![0, 1, 0xab],
        };
        let json = serde_json::to_value(&attribute).expect("serialize");
        assert_eq!(json["bytes"], "0001ab");
        assert_eq!(json["member"]["kind"], "field");
        assert_eq!(json["member"]["name"], "f");
    }

    #[test]
    fn occurrences_default_to_class_members() {
        let occurrence: Occurrence = serde_json::from_str(
            r#"{"class_name": "a.B", "file": "B.java", "line": 3, "literal": "Marker"}"#,
        )
        .expect("deserialize");
        assert_eq!(occurrence.member, MemberRef::Class);
    }

    #[test]
    fn diagnostics_read_like_compiler_errors() {
        let diagnostic = Diagnostic::new(
            DiagnosticCode::PARSE_ERROR,
            &occurrence(method("run"), 7, "A("),
            None,
            "boom".to_string(),
        );
        assert_eq!(
            diagnostic.to_string(),
            "Service.java:7: error in class [com.example.Service] member [run()V]: boom"
        );
    }
}
