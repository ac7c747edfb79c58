use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use serde_sarif::sarif::{Artifact, ArtifactLocation, ArtifactRoles};
use tracing::debug;

use crate::classpath::ClasspathIndex;
use crate::compiler::Occurrence;

/// Occurrence records read from the inputs, plus the files they came from.
pub struct ScanOutput {
    pub artifacts: Vec<Artifact>,
    pub occurrences: Vec<Occurrence>,
}

/// Read one occurrence file, or every `.json` file below a directory.
pub fn scan_inputs(input: &Path) -> Result<ScanOutput> {
    let mut output = ScanOutput {
        artifacts: Vec::new(),
        occurrences: Vec::new(),
    };
    if input.is_dir() {
        scan_dir(input, &mut output)?;
    } else {
        scan_file(input, true, &mut output)?;
    }
    debug!(
        files = output.artifacts.len(),
        occurrences = output.occurrences.len(),
        "scanned inputs"
    );
    Ok(output)
}

/// Load the type schema used to resolve literals.
pub fn load_schema(path: &Path) -> Result<ClasspathIndex> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read schema {}", path.display()))?;
    ClasspathIndex::from_json(&data)
        .with_context(|| format!("failed to load schema {}", path.display()))
}

fn scan_dir(path: &Path, output: &mut ScanOutput) -> Result<()> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(path)
        .with_context(|| format!("failed to read directory {}", path.display()))?
    {
        let entry =
            entry.with_context(|| format!("failed to read entry under {}", path.display()))?;
        entries.push(entry.path());
    }

    entries.sort_by(|a, b| path_key(a).cmp(&path_key(b)));

    for entry in entries {
        if entry.is_dir() {
            scan_dir(&entry, output)?;
        } else {
            scan_file(&entry, false, output)?;
        }
    }
    Ok(())
}

fn scan_file(path: &Path, strict: bool, output: &mut ScanOutput) -> Result<()> {
    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
    if extension != "json" {
        if strict {
            anyhow::bail!("unsupported input file: {}", path.display());
        }
        return Ok(());
    }

    let data =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let deserializer = &mut serde_json::Deserializer::from_str(&data);
    let occurrences: Vec<Occurrence> = serde_path_to_error::deserialize(deserializer)
        .map_err(|err| {
            anyhow::anyhow!(
                "malformed occurrences at {}: {}",
                err.path(),
                err.inner()
            )
        })
        .with_context(|| format!("failed to parse {}", path.display()))?;

    let roles = vec![
        serde_json::to_value(ArtifactRoles::AnalysisTarget).context("serialize artifact role")?,
    ];
    push_artifact(path_to_uri(path), data.len() as u64, roles, &mut output.artifacts);
    output.occurrences.extend(occurrences);
    Ok(())
}

fn push_artifact(uri: String, len: u64, roles: Vec<Value>, artifacts: &mut Vec<Artifact>) {
    let location = ArtifactLocation::builder().uri(uri).build();
    let artifact = Artifact::builder()
        .location(location)
        .length(len as i64)
        .roles(roles)
        .build();
    artifacts.push(artifact);
}

pub(crate) fn path_to_uri(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("file://{}", absolute.to_string_lossy())
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::MemberRef;

    fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(path, contents).expect("write input");
    }

    fn occurrence_json(class_name: &str, line: u32) -> String {
        format!(
            r#"[{{"class_name": "{class_name}", "file": "A.java", "line": {line}, "literal": "Marker"}}]"#
        )
    }

    #[test]
    fn scan_inputs_reads_directories_in_sorted_order() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        write(&temp_dir.path().join("b.json"), &occurrence_json("p.B", 2));
        write(&temp_dir.path().join("a/nested.json"), &occurrence_json("p.A", 1));
        write(&temp_dir.path().join("notes.txt"), "ignored");

        let output = scan_inputs(temp_dir.path()).expect("scan");
        let classes: Vec<&str> = output
            .occurrences
            .iter()
            .map(|occurrence| occurrence.class_name.as_str())
            .collect();
        assert_eq!(classes, vec!["p.A", "p.B"]);
        assert_eq!(output.artifacts.len(), 2);
        assert_eq!(output.occurrences[0].member, MemberRef::Class);
    }

    #[test]
    fn scan_inputs_reports_json_path_of_malformed_records() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("bad.json");
        write(
            &path,
            r#"[{"class_name": "p.A", "file": "A.java", "line": "one", "literal": "Marker"}]"#,
        );
        let err = scan_inputs(&path).err().expect("malformed input");
        let message = format!("{err:#}");
        assert!(message.contains("[0].line"), "{message}");
    }

    #[test]
    fn scan_inputs_rejects_unsupported_input_file() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let path = temp_dir.path().join("input.txt");
        write(&path, "[]");
        assert!(scan_inputs(&path).is_err());
    }

    #[test]
    fn path_to_uri_is_absolute() {
        let uri = path_to_uri(Path::new("relative/file.json"));
        assert!(uri.starts_with("file:///"), "{uri}");
        assert!(uri.ends_with("relative/file.json"));
    }
}
