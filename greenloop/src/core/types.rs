//! Shared deterministic types for the phase loop.
//!
//! These types define stable contracts between the loop and its adapters.
//! They must not depend on external state or I/O.

use serde::{Deserialize, Serialize};

/// The workflow phase a loop invocation runs under.
///
/// The phase decides which prompt template the generator renders, whether the
/// declared file set is backed up before the first iteration, and whether an
/// initial expect-failure validation seeds the feedback text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseKind {
    /// Author the manifest from a high-level goal.
    Plan,
    /// Review and amend an existing manifest.
    ReviewPlan,
    /// Author behavioral tests for the manifest's artifacts.
    GenerateTest,
    /// Implement the declared artifacts until validation passes.
    Implement,
    /// Restructure passing code without changing behavior.
    Refactor,
    /// Refine the manifest in place after feedback.
    Refine,
    /// Fix a regression against an existing manifest.
    Fix,
}

impl PhaseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseKind::Plan => "plan",
            PhaseKind::ReviewPlan => "review-plan",
            PhaseKind::GenerateTest => "generate-test",
            PhaseKind::Implement => "implement",
            PhaseKind::Refactor => "refactor",
            PhaseKind::Refine => "refine",
            PhaseKind::Fix => "fix",
        }
    }

    /// Pure-creation phases operate on files that do not exist yet and skip
    /// the backup snapshot entirely.
    pub fn backup_applies(self) -> bool {
        !matches!(self, PhaseKind::Plan)
    }

    /// Phases that edit the manifest itself rather than the code it declares.
    pub fn mutates_manifest(self) -> bool {
        matches!(self, PhaseKind::ReviewPlan | PhaseKind::Refine)
    }

    /// Phases that run an initial expect-failure validation before the loop
    /// and seed the first iteration's feedback with its diagnostic.
    pub fn red_check(self) -> bool {
        matches!(self, PhaseKind::Implement | PhaseKind::Fix)
    }
}

/// A file the generation adapter wants written, path relative to the project
/// root. The loop owns the write: the path must clear the path guard and the
/// content must fit the configured size cap before anything touches disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}

/// Structured output of one generation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateOutcome {
    pub success: bool,
    #[serde(default)]
    pub files: Vec<GeneratedFile>,
    #[serde(default)]
    pub error: Option<String>,
}

/// What the loop decided after an iteration finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationDecision {
    /// Another iteration follows.
    Retry,
    /// Validation passed; the loop stops.
    StopSuccess,
    /// The loop stops without passing validation.
    StopFailure,
}

/// Result of one validation run.
///
/// Consumed immediately by the loop: on failure the diagnostic text becomes
/// the next iteration's feedback, on success the loop stops. Not retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    /// Diagnostic lines extracted from the raw output, most specific first.
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn passed() -> Self {
        Self {
            success: true,
            stdout: String::new(),
            stderr: String::new(),
            errors: Vec::new(),
        }
    }

    /// Render a human-readable diagnostic from the captured output.
    ///
    /// Sections are emitted in a fixed order (errors, stdout, stderr) and
    /// empty sections are dropped, so the same result always renders the
    /// same feedback text.
    pub fn diagnostic(&self) -> String {
        let mut buf = String::new();
        if !self.errors.is_empty() {
            buf.push_str("=== errors ===\n");
            for line in &self.errors {
                buf.push_str(line);
                buf.push('\n');
            }
        }
        if !self.stdout.trim().is_empty() {
            buf.push_str("=== stdout ===\n");
            buf.push_str(self.stdout.trim_end());
            buf.push('\n');
        }
        if !self.stderr.trim().is_empty() {
            buf.push_str("=== stderr ===\n");
            buf.push_str(self.stderr.trim_end());
            buf.push('\n');
        }
        buf
    }
}
