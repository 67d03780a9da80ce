//! Validation adapter: the gate every iteration must pass.
//!
//! The [`Validator`] trait decouples the phase loop from the actual gate.
//! The real gate combines a structural manifest-compliance check with the
//! manifest's behavioral test command; both must pass. Tests use scripted
//! validators that return predetermined results.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use tracing::{debug, info, instrument};

use crate::core::types::ValidationResult;
use crate::manifest::{Manifest, check_consistency, load_manifest};

/// Lines worth feeding back to the next generation attempt.
static DIAGNOSTIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(error|failed|assert|exception|traceback|timed out)").unwrap()
});

const MAX_DIAGNOSTIC_LINES: usize = 50;

pub trait Validator {
    fn validate(&self, manifest_path: &Path) -> Result<ValidationResult>;
}

/// The real validation gate.
///
/// With `behavioral` off (planning phases) only the manifest itself is
/// checked: schema conformance and file-permission consistency. With it on,
/// the declared artifacts must be present in the target file and the
/// manifest's `validationCommand` must exit zero within the time budget.
pub struct GateValidator {
    pub root: PathBuf,
    pub behavioral: bool,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl Validator for GateValidator {
    #[instrument(skip_all, fields(behavioral = self.behavioral))]
    fn validate(&self, manifest_path: &Path) -> Result<ValidationResult> {
        let manifest = load_manifest(manifest_path)?;

        let mut errors = Vec::new();
        let report = check_consistency(&manifest, &self.root);
        for warning in &report.warnings {
            tracing::warn!(warning, "manifest inconsistency");
        }
        errors.extend(report.errors);

        if self.behavioral {
            errors.extend(artifact_compliance(&manifest, &self.root));
        }

        if !self.behavioral {
            return Ok(ValidationResult {
                success: errors.is_empty(),
                stdout: String::new(),
                stderr: String::new(),
                errors,
            });
        }

        let run = run_validation_command(
            &manifest,
            &self.root,
            self.timeout,
            self.output_limit_bytes,
        )?;
        errors.extend(run.errors);
        Ok(ValidationResult {
            success: errors.is_empty() && run.success,
            stdout: run.stdout,
            stderr: run.stderr,
            errors,
        })
    }
}

/// Check that every declared artifact name appears in the target file.
fn artifact_compliance(manifest: &Manifest, root: &Path) -> Vec<String> {
    let target = root.join(&manifest.expected_artifacts.file);
    let contents = match fs::read_to_string(&target) {
        Ok(contents) => contents,
        Err(_) => {
            return vec![format!(
                "artifact target '{}' does not exist",
                manifest.expected_artifacts.file
            )];
        }
    };
    manifest
        .expected_artifacts
        .contains
        .iter()
        .filter(|artifact| !contents.contains(&artifact.name))
        .map(|artifact| {
            format!(
                "declared {} '{}' not found in '{}'",
                artifact.kind, artifact.name, manifest.expected_artifacts.file
            )
        })
        .collect()
}

fn run_validation_command(
    manifest: &Manifest,
    root: &Path,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<ValidationResult> {
    let program = manifest
        .validation_command
        .first()
        .ok_or_else(|| anyhow!("manifest has no validationCommand"))?;
    info!(command = ?manifest.validation_command, "running behavioral tests");

    let mut cmd = Command::new(program);
    cmd.args(&manifest.validation_command[1..]).current_dir(root);
    let output =
        crate::io::process::run_command_with_timeout(cmd, None, timeout, output_limit_bytes)
            .context("run validation command")?;

    let stdout = output.stdout_text();
    let stderr = output.stderr_text();
    let mut errors = Vec::new();
    if output.timed_out {
        errors.push(format!(
            "validation command timed out after {}s",
            timeout.as_secs()
        ));
    } else if !output.status.success() {
        errors.extend(extract_diagnostics(&stdout, &stderr));
    }

    debug!(success = output.success(), errors = errors.len(), "behavioral tests finished");
    Ok(ValidationResult {
        success: output.success(),
        stdout,
        stderr,
        errors,
    })
}

/// Pull the lines most likely to explain a failure out of raw output.
fn extract_diagnostics(stdout: &str, stderr: &str) -> Vec<String> {
    stdout
        .lines()
        .chain(stderr.lines())
        .filter(|line| DIAGNOSTIC_RE.is_match(line))
        .take(MAX_DIAGNOSTIC_LINES)
        .map(|line| line.trim_end().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ArtifactSpec, ExpectedArtifacts, write_manifest};

    fn manifest_with_command(command: Vec<&str>) -> Manifest {
        Manifest {
            goal: "goal".to_string(),
            description: String::new(),
            task_type: String::new(),
            creatable_files: Vec::new(),
            editable_files: Vec::new(),
            readonly_files: Vec::new(),
            expected_artifacts: ExpectedArtifacts {
                file: "app.py".to_string(),
                contains: vec![ArtifactSpec {
                    kind: "function".to_string(),
                    name: "health".to_string(),
                    args: Vec::new(),
                    returns: None,
                    class: None,
                    bases: Vec::new(),
                    attribute_type: None,
                    description: None,
                }],
            },
            validation_command: command.into_iter().map(str::to_string).collect(),
        }
    }

    fn write_project(root: &Path, manifest: &Manifest) -> PathBuf {
        let path = root.join("manifest.json");
        write_manifest(&path, manifest).expect("write manifest");
        path
    }

    #[test]
    fn structural_only_passes_without_running_commands() {
        let temp = tempfile::tempdir().expect("tempdir");
        // The command would fail if it ran; structural mode must not run it.
        let manifest = manifest_with_command(vec!["false"]);
        let path = write_project(temp.path(), &manifest);

        let validator = GateValidator {
            root: temp.path().to_path_buf(),
            behavioral: false,
            timeout: Duration::from_secs(5),
            output_limit_bytes: 10_000,
        };
        let result = validator.validate(&path).expect("validate");
        assert!(result.success);
    }

    #[test]
    fn behavioral_passes_when_artifacts_exist_and_command_succeeds() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("app.py"), "def health():\n    return {}\n").expect("write");
        let manifest = manifest_with_command(vec!["true"]);
        let path = write_project(temp.path(), &manifest);

        let validator = GateValidator {
            root: temp.path().to_path_buf(),
            behavioral: true,
            timeout: Duration::from_secs(5),
            output_limit_bytes: 10_000,
        };
        let result = validator.validate(&path).expect("validate");
        assert!(result.success);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn behavioral_fails_with_extracted_diagnostics() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("app.py"), "def health():\n    return {}\n").expect("write");
        let manifest = manifest_with_command(vec![
            "sh",
            "-c",
            "echo 'collected 3 items'; echo 'AssertionError: expected True' >&2; exit 1",
        ]);
        let path = write_project(temp.path(), &manifest);

        let validator = GateValidator {
            root: temp.path().to_path_buf(),
            behavioral: true,
            timeout: Duration::from_secs(5),
            output_limit_bytes: 10_000,
        };
        let result = validator.validate(&path).expect("validate");
        assert!(!result.success);
        assert!(result.errors.iter().any(|e| e.contains("AssertionError")));
    }

    #[test]
    fn missing_artifact_fails_compliance() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("app.py"), "def other():\n    pass\n").expect("write");
        let manifest = manifest_with_command(vec!["true"]);
        let path = write_project(temp.path(), &manifest);

        let validator = GateValidator {
            root: temp.path().to_path_buf(),
            behavioral: true,
            timeout: Duration::from_secs(5),
            output_limit_bytes: 10_000,
        };
        let result = validator.validate(&path).expect("validate");
        assert!(!result.success);
        assert!(result.errors.iter().any(|e| e.contains("'health'")));
    }

    #[test]
    fn timeout_produces_a_timeout_diagnostic() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("app.py"), "def health():\n    pass\n").expect("write");
        let manifest = manifest_with_command(vec!["sleep", "30"]);
        let path = write_project(temp.path(), &manifest);

        let validator = GateValidator {
            root: temp.path().to_path_buf(),
            behavioral: true,
            timeout: Duration::from_millis(100),
            output_limit_bytes: 10_000,
        };
        let result = validator.validate(&path).expect("validate");
        assert!(!result.success);
        assert!(result.errors.iter().any(|e| e.contains("timed out")));
    }

    #[test]
    fn extract_diagnostics_keeps_only_relevant_lines() {
        let lines = extract_diagnostics(
            "collected 3 items\nFAILED tests/test_x.py::test_a\nall good here\n",
            "Traceback (most recent call last):\n",
        );
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("FAILED"));
        assert!(lines[1].contains("Traceback"));
    }
}
