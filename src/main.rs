use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info_span;

use backport175::compiler::{
    CollectingSink, CompiledAttribute, Diagnostic, MessageSink, Occurrence, TracingSink,
    compile_batch,
};
use backport175::defaults::{DefaultsRegistry, LoaderContext, ModuleToken};
use backport175::projection::MemberAnnotations;
use backport175::report::{InvocationStats, build_invocation, build_sarif};
use backport175::scan::{load_schema, scan_inputs};
use backport175::telemetry::init_logging;
use backport175::value::AnnotationValue;

/// CLI arguments for backport175 execution.
#[derive(Parser, Debug)]
#[command(
    name = "backport175",
    about = "Compile annotation literals into class-file attributes and decode them back.",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Suppress log and timing output.
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve and encode annotation literal occurrences.
    Compile(CompileArgs),
    /// Decode a hex-encoded member annotations attribute.
    Decode(DecodeArgs),
}

#[derive(Args, Debug)]
struct CompileArgs {
    /// JSON type schema with annotation interfaces, enums and classes.
    #[arg(long, value_name = "PATH")]
    schema: PathBuf,
    /// Occurrence JSON file, or a directory of them.
    #[arg(long, value_name = "PATH")]
    input: PathBuf,
    /// Where to write compiled attributes; stdout when omitted or `-`.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    /// Where to write the SARIF diagnostics report.
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
    #[arg(long)]
    timing: bool,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    #[arg(long, value_name = "PATH")]
    schema: PathBuf,
    /// Attribute bytes as hex.
    #[arg(long, value_name = "HEX")]
    hex: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if !cli.quiet {
        init_logging();
    }
    match cli.command {
        Command::Compile(args) => compile(args, cli.quiet),
        Command::Decode(args) => decode(args),
    }
}

fn compile(args: CompileArgs, quiet: bool) -> Result<()> {
    if !args.input.exists() {
        anyhow::bail!("input not found: {}", args.input.display());
    }
    if !args.schema.exists() {
        anyhow::bail!("schema not found: {}", args.schema.display());
    }

    let started_at = Instant::now();
    let index = load_schema(&args.schema)?;
    let scan_started_at = Instant::now();
    let scan = scan_inputs(&args.input)?;
    let scan_duration_ms = scan_started_at.elapsed().as_millis();
    let artifact_count = scan.artifacts.len();

    let compile_started_at = Instant::now();
    let context = LoaderContext::new(&index, DefaultsRegistry::global(), ModuleToken::default());
    let sink = ReportingSink::default();
    let mut attributes: Vec<CompiledAttribute> = Vec::new();
    let summary = {
        let span = info_span!("compile", input = %args.input.display());
        let _entered = span.enter();
        compile_batch(&scan.occurrences, context, &sink, &mut attributes)
    };
    let compile_duration_ms = compile_started_at.elapsed().as_millis();

    let mut writer = output_writer(args.output.as_deref())?;
    serde_json::to_writer_pretty(&mut writer, &attributes)
        .context("failed to serialize compiled attributes")?;
    writer
        .write_all(b"\n")
        .context("failed to write compiled attributes")?;

    if let Some(report) = args.report.as_deref() {
        let diagnostics = sink.collected.errors();
        let invocation = build_invocation(
            std::env::args().collect(),
            &InvocationStats {
                scan_duration_ms,
                compile_duration_ms,
                artifact_count,
                summary,
            },
        );
        let sarif = build_sarif(scan.artifacts, invocation, &diagnostics);
        let mut writer = output_writer(Some(report))?;
        serde_json::to_writer_pretty(&mut writer, &sarif)
            .context("failed to serialize SARIF output")?;
        writer
            .write_all(b"\n")
            .context("failed to write SARIF output")?;
    }

    if args.timing && !quiet {
        eprintln!(
            "timing: total_ms={} scan_ms={} compile_ms={} occurrences={} artifacts={}",
            started_at.elapsed().as_millis(),
            scan_duration_ms,
            compile_duration_ms,
            summary.occurrences,
            artifact_count
        );
    }

    if summary.has_failures() {
        anyhow::bail!(
            "{} of {} annotation occurrences failed to compile",
            summary.failed,
            summary.occurrences
        );
    }
    Ok(())
}

/// Logs every message and keeps the errors for the SARIF report.
#[derive(Default)]
struct ReportingSink {
    log: TracingSink,
    collected: CollectingSink,
}

impl MessageSink for ReportingSink {
    fn info(&self, message: &str) {
        self.log.info(message);
    }

    fn error(&self, diagnostic: &Diagnostic) {
        self.log.error(diagnostic);
        self.collected.error(diagnostic);
    }

    fn accept(&self, occurrence: &Occurrence, annotation: &AnnotationValue) {
        self.log.accept(occurrence, annotation);
    }
}

fn decode(args: DecodeArgs) -> Result<()> {
    let index = load_schema(&args.schema)?;
    let bytes = hex::decode(args.hex.trim()).context("attribute is not valid hex")?;
    let context = LoaderContext::new(&index, DefaultsRegistry::global(), ModuleToken::default());
    let member = MemberAnnotations::decode(&bytes, &context).context("failed to decode attribute")?;

    let mut writer = output_writer(None)?;
    serde_json::to_writer_pretty(&mut writer, member.annotations())
        .context("failed to serialize decoded annotations")?;
    writer
        .write_all(b"\n")
        .context("failed to write decoded annotations")?;
    Ok(())
}

fn output_writer(output: Option<&Path>) -> Result<Box<dyn Write>> {
    match output {
        Some(path) if path == Path::new("-") => Ok(Box::new(io::stdout())),
        Some(path) => Ok(Box::new(
            File::create(path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Ok(Box::new(io::stdout())),
    }
}
