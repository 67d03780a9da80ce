//! The work manifest: goal, file permissions, expected artifacts, and how to
//! validate them.
//!
//! Created by the planning phase, mutated in place by refinement and review,
//! read-only to implementation, refactoring, and fix phases.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use jsonschema::Draft;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const MANIFEST_SCHEMA: &str = include_str!("../schemas/manifest.schema.json");

/// A persisted unit of work (camelCase on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub goal: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub task_type: String,
    /// Paths the generator may create; they should not exist yet.
    #[serde(default)]
    pub creatable_files: Vec<String>,
    /// Paths the generator may edit; they must already exist.
    #[serde(default)]
    pub editable_files: Vec<String>,
    /// Paths consulted but never written, test files included.
    #[serde(default)]
    pub readonly_files: Vec<String>,
    pub expected_artifacts: ExpectedArtifacts,
    /// Argument vector for the behavioral validation run.
    #[serde(default)]
    pub validation_command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedArtifacts {
    /// Target file the declared artifacts must appear in.
    pub file: String,
    #[serde(default)]
    pub contains: Vec<ArtifactSpec>,
}

/// One declared artifact: a function, class, or attribute the target file
/// must define.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<ArgSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgSpec {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// File-permission consistency against the live project tree.
///
/// Missing editable files are errors; pre-existing creatable files are a
/// warning-level inconsistency, not fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ConsistencyReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parse and validate a manifest: schema conformance first, struct second.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    debug!(path = %path.display(), "loading manifest");
    let raw =
        fs::read_to_string(path).with_context(|| format!("read manifest {}", path.display()))?;
    parse_manifest(&raw).with_context(|| format!("parse manifest {}", path.display()))
}

/// Parse and validate manifest text without touching the filesystem.
pub fn parse_manifest(raw: &str) -> Result<Manifest> {
    let instance: Value = serde_json::from_str(raw).context("parse manifest json")?;
    validate_schema(&instance)?;
    let manifest: Manifest = serde_json::from_str(raw).context("parse manifest struct")?;
    Ok(manifest)
}

/// Atomically write a manifest to disk (temp file + rename).
pub fn write_manifest(path: &Path, manifest: &Manifest) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(manifest).context("serialize manifest")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("manifest path missing parent {}", path.display()))?;
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &buf)
        .with_context(|| format!("write temp manifest {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace manifest {}", path.display()))?;
    Ok(())
}

/// Check declared file permissions against the project tree rooted at `root`.
pub fn check_consistency(manifest: &Manifest, root: &Path) -> ConsistencyReport {
    let mut report = ConsistencyReport::default();
    for path in &manifest.editable_files {
        if !root.join(path).exists() {
            report
                .errors
                .push(format!("editable file '{path}' does not exist"));
        }
    }
    for path in &manifest.creatable_files {
        if root.join(path).exists() {
            report
                .warnings
                .push(format!("creatable file '{path}' already exists"));
        }
    }
    report
}

/// Validate a JSON instance against the embedded manifest schema
/// (Draft 2020-12).
fn validate_schema(instance: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(MANIFEST_SCHEMA).context("parse manifest schema")?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .context("compile manifest schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}
