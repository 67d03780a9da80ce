//! Generation adapter for agent invocation.
//!
//! The [`Generator`] trait decouples the phase loop from the actual agent
//! backend. Tests use scripted generators that return predetermined outcomes
//! without spawning processes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::Draft;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::types::{GenerateOutcome, PhaseKind};
use crate::io::layout::WorkDirs;
use crate::io::process::{CommandOutput, run_command_with_timeout};
use crate::io::prompt::{PromptEngine, PromptInputs};

const OUTPUT_SCHEMA: &str = include_str!("../../schemas/generation_output.schema.json");

/// Parameters for one generation attempt.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// Manifest the attempt works against. May not exist yet for planning.
    pub manifest_path: PathBuf,
    /// Phase the attempt runs under; selects the prompt template.
    pub phase: PhaseKind,
    /// Diagnostic text from the previous failed validation, empty on the
    /// first iteration.
    pub feedback: String,
    /// Operator-supplied extra instructions.
    pub instructions: String,
    /// Iteration number (1-indexed).
    pub iteration: u32,
}

/// Abstraction over generation backends.
pub trait Generator {
    fn produce(&self, request: &GenerateRequest) -> Result<GenerateOutcome>;
}

/// Generator that spawns the configured agent CLI.
///
/// The prompt is fed on stdin; the agent must write its structured outcome
/// JSON to the path passed via `--output-last-message`, constrained by the
/// embedded output schema.
pub struct CliGenerator {
    pub dirs: WorkDirs,
    pub command: Vec<String>,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
    pub bypass_permissions: bool,
    engine: PromptEngine,
}

impl CliGenerator {
    pub fn new(
        dirs: WorkDirs,
        command: Vec<String>,
        timeout: Duration,
        output_limit_bytes: usize,
        bypass_permissions: bool,
    ) -> Self {
        Self {
            dirs,
            command,
            timeout,
            output_limit_bytes,
            bypass_permissions,
            engine: PromptEngine::new(),
        }
    }

    fn render_prompt(&self, request: &GenerateRequest) -> Result<String> {
        let manifest = match fs::read_to_string(&request.manifest_path) {
            Ok(raw) => Some(raw),
            Err(_) => None,
        };
        let inputs = PromptInputs {
            manifest,
            feedback: Some(request.feedback.clone()),
            instructions: Some(request.instructions.clone()),
            iteration: request.iteration,
        };
        self.engine.render(request.phase, &inputs)
    }
}

impl Generator for CliGenerator {
    #[instrument(skip_all, fields(phase = request.phase.as_str(), iteration = request.iteration))]
    fn produce(&self, request: &GenerateRequest) -> Result<GenerateOutcome> {
        info!(workdir = %self.dirs.root.display(), "starting agent run");

        let prompt = self.render_prompt(request)?;
        let iter_dir = self
            .dirs
            .iteration_dir(request.phase.as_str(), request.iteration);
        fs::create_dir_all(&iter_dir)
            .with_context(|| format!("create iteration dir {}", iter_dir.display()))?;

        let schema_path = self.dirs.greenloop_dir.join("generation_output.schema.json");
        fs::write(&schema_path, OUTPUT_SCHEMA)
            .with_context(|| format!("write output schema {}", schema_path.display()))?;
        let output_path = iter_dir.join("generation.json");
        let log_path = iter_dir.join("agent.log");

        let program = self
            .command
            .first()
            .ok_or_else(|| anyhow!("agent command is empty"))?;
        let mut cmd = Command::new(program);
        cmd.args(&self.command[1..]);
        if self.bypass_permissions {
            cmd.arg("--sandbox").arg("danger-full-access");
        }
        cmd.arg("--output-schema")
            .arg(&schema_path)
            .arg("--output-last-message")
            .arg(&output_path)
            .arg("-")
            .current_dir(&self.dirs.root);

        let output = run_command_with_timeout(
            cmd,
            Some(prompt.as_bytes()),
            self.timeout,
            self.output_limit_bytes,
        )
        .context("run agent command")?;

        write_agent_log(&log_path, &output)?;

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "agent command timed out");
            return Err(anyhow!(
                "agent command timed out after {}s",
                self.timeout.as_secs()
            ));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "agent command failed");
            return Err(anyhow!(
                "agent command failed with status {:?}: {}",
                output.status.code(),
                preview(&output.stderr_text())
            ));
        }

        let outcome = read_outcome(&output_path)?;
        debug!(
            success = outcome.success,
            files = outcome.files.len(),
            "parsed generation outcome"
        );
        Ok(outcome)
    }
}

/// Load and schema-check the agent's outcome JSON.
fn read_outcome(path: &Path) -> Result<GenerateOutcome> {
    if !path.exists() {
        return Err(anyhow!("missing agent output {}", path.display()));
    }
    let raw =
        fs::read_to_string(path).with_context(|| format!("read agent output {}", path.display()))?;
    let instance: Value =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;

    let schema: Value = serde_json::from_str(OUTPUT_SCHEMA).context("parse output schema")?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .context("compile output schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(&instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!(
            "agent output failed schema validation:\n- {}\nresponse preview: {}",
            messages.join("\n- "),
            preview(&raw)
        );
    }

    let outcome: GenerateOutcome =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    Ok(outcome)
}

fn write_agent_log(path: &Path, output: &CommandOutput) -> Result<()> {
    let mut buf = String::new();
    buf.push_str("=== stdout ===\n");
    buf.push_str(&output.stdout_text());
    if output.stdout_truncated > 0 {
        buf.push_str(&format!("\n[stdout truncated {} bytes]\n", output.stdout_truncated));
    }
    buf.push_str("\n=== stderr ===\n");
    buf.push_str(&output.stderr_text());
    if output.stderr_truncated > 0 {
        buf.push_str(&format!("\n[stderr truncated {} bytes]\n", output.stderr_truncated));
    }
    if output.timed_out {
        buf.push_str("\n[agent timed out]\n");
    }
    fs::write(path, buf).with_context(|| format!("write agent log {}", path.display()))
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 400;
    let trimmed = text.trim();
    if trimmed.len() <= LIMIT {
        return trimmed.to_string();
    }
    let mut end = LIMIT;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &trimmed[..end])
}
