//! SARIF output for compile diagnostics.

use std::collections::BTreeMap;

use serde_json::json;
use serde_sarif::sarif::{
    Artifact, ArtifactLocation, Invocation, Location, LogicalLocation, Message,
    MultiformatMessageString, PhysicalLocation, PropertyBag, Region, ReportingDescriptor,
    Result as SarifResult, Run, SCHEMA_URL, Sarif, Tool, ToolComponent,
};

use crate::compiler::{BatchSummary, Diagnostic, DiagnosticCode, MemberRef};

const TOOL_NAME: &str = "backport175";

/// Metadata captured for SARIF invocation properties.
pub struct InvocationStats {
    pub scan_duration_ms: u128,
    pub compile_duration_ms: u128,
    pub artifact_count: usize,
    pub summary: BatchSummary,
}

pub fn build_invocation(arguments: Vec<String>, stats: &InvocationStats) -> Invocation {
    let command_line = arguments.join(" ");
    let mut properties = BTreeMap::new();
    properties.insert("backport175.scan_ms".to_string(), json!(stats.scan_duration_ms));
    properties.insert(
        "backport175.compile_ms".to_string(),
        json!(stats.compile_duration_ms),
    );
    properties.insert(
        "backport175.artifact_count".to_string(),
        json!(stats.artifact_count),
    );
    properties.insert(
        "backport175.occurrence_count".to_string(),
        json!(stats.summary.occurrences),
    );
    properties.insert(
        "backport175.accepted_count".to_string(),
        json!(stats.summary.accepted),
    );
    properties.insert(
        "backport175.skipped_count".to_string(),
        json!(stats.summary.skipped),
    );

    Invocation::builder()
        .execution_successful(!stats.summary.has_failures())
        .arguments(arguments)
        .command_line(command_line)
        .properties(PropertyBag::builder().additional_properties(properties).build())
        .build()
}

pub fn build_sarif(
    artifacts: Vec<Artifact>,
    invocation: Invocation,
    diagnostics: &[Diagnostic],
) -> Sarif {
    let rules = DiagnosticCode::ALL.iter().map(rule_descriptor).collect::<Vec<_>>();
    let results = diagnostics.iter().map(diagnostic_result).collect::<Vec<_>>();
    let driver = ToolComponent::builder()
        .name(TOOL_NAME)
        .rules(rules)
        .build();
    let tool = Tool {
        driver,
        extensions: None,
        properties: None,
    };
    let run = if artifacts.is_empty() {
        Run::builder()
            .tool(tool)
            .invocations(vec![invocation])
            .results(results)
            .build()
    } else {
        Run::builder()
            .tool(tool)
            .invocations(vec![invocation])
            .results(results)
            .artifacts(artifacts)
            .build()
    };

    Sarif::builder()
        .schema(SCHEMA_URL)
        .runs(vec![run])
        .version(json!("2.1.0"))
        .build()
}

fn rule_descriptor(code: &DiagnosticCode) -> ReportingDescriptor {
    ReportingDescriptor::builder()
        .id(code.id)
        .name(code.name)
        .short_description(
            MultiformatMessageString::builder()
                .text(code.description)
                .build(),
        )
        .build()
}

fn diagnostic_result(diagnostic: &Diagnostic) -> SarifResult {
    let mut result = SarifResult::builder()
        .message(result_message(&diagnostic.message))
        .locations(vec![diagnostic_location(diagnostic)])
        .build();
    result.rule_id = Some(diagnostic.code.id.to_string());
    result
}

fn diagnostic_location(diagnostic: &Diagnostic) -> Location {
    let logical = member_logical_location(&diagnostic.class_name, &diagnostic.member);
    if diagnostic.file.is_empty() {
        return Location::builder().logical_locations(vec![logical]).build();
    }
    let artifact_location = ArtifactLocation::builder()
        .uri(diagnostic.file.clone())
        .build();
    let physical = if diagnostic.line > 0 {
        let region = Region::builder()
            .start_line(i64::from(diagnostic.line))
            .build();
        PhysicalLocation::builder()
            .artifact_location(artifact_location)
            .region(region)
            .build()
    } else {
        PhysicalLocation::builder()
            .artifact_location(artifact_location)
            .build()
    };
    Location::builder()
        .logical_locations(vec![logical])
        .physical_location(physical)
        .build()
}

fn member_logical_location(class_name: &str, member: &MemberRef) -> LogicalLocation {
    match member {
        MemberRef::Class => LogicalLocation::builder()
            .name(class_name)
            .kind("type")
            .build(),
        MemberRef::Field { name } => LogicalLocation::builder()
            .name(format!("{class_name}.{name}"))
            .kind("member")
            .build(),
        MemberRef::Method { name, descriptor } => LogicalLocation::builder()
            .name(format!("{class_name}.{name}{descriptor}"))
            .kind("function")
            .build(),
    }
}

fn result_message(text: impl Into<String>) -> Message {
    Message::builder().text(text.into()).build()
}
