//! Orchestration for one phase: the produce → apply → validate → decide loop.
//!
//! Every phase (planning, test authoring, implementation, refactoring,
//! refinement, fixing) runs the same loop; phase differences live in
//! [`PhaseSpec`] and the adapters. The loop owns all file writes, the backup
//! snapshot, and the retry/abort decisions.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::core::classifier::classify;
use crate::core::error_context::{ErrorContextMode, should_restore_files};
use crate::core::path_guard::PathGuard;
use crate::core::retry::{RetryConfirmer, RetryMode, should_retry};
use crate::core::types::{GeneratedFile, IterationDecision, PhaseKind, ValidationResult};
use crate::io::agent::{GenerateRequest, Generator};
use crate::io::backup::FileBackup;
use crate::io::iteration_log::{IterationMeta, IterationWriteRequest, write_iteration};
use crate::io::layout::WorkDirs;
use crate::io::validator::Validator;
use crate::io::workspace::{LiveWriter, NullWriter, WorkspaceWriter};
use crate::manifest::{Manifest, load_manifest};

/// Per-invocation loop parameters. Immutable while the loop runs.
#[derive(Debug, Clone)]
pub struct LoopOptions {
    pub max_iterations: u32,
    pub retry_mode: RetryMode,
    pub error_context_mode: ErrorContextMode,
    /// Reject generated files larger than this many bytes.
    pub max_file_bytes: usize,
    /// Swap every filesystem port for a no-op implementation.
    pub dry_run: bool,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            retry_mode: RetryMode::Auto,
            error_context_mode: ErrorContextMode::Incremental,
            max_file_bytes: 200_000,
            dry_run: false,
        }
    }
}

/// What to run: the phase and any operator instructions for it.
#[derive(Debug, Clone)]
pub struct PhaseSpec {
    pub kind: PhaseKind,
    pub instructions: String,
}

impl PhaseSpec {
    pub fn new(kind: PhaseKind) -> Self {
        Self {
            kind,
            instructions: String::new(),
        }
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseStop {
    /// Validation passed.
    Passed,
    /// The iteration budget ran out without a passing validation.
    RetriesExhausted { max_iterations: u32, last_error: String },
    /// Retries were disabled or the operator declined one.
    RetryDeclined { iteration: u32, last_error: String },
    /// The failure cannot be fixed by generating different code.
    Systemic { explanation: String, diagnostic: String },
}

impl PhaseStop {
    pub fn is_success(&self) -> bool {
        matches!(self, PhaseStop::Passed)
    }
}

impl fmt::Display for PhaseStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseStop::Passed => write!(f, "validation passed"),
            PhaseStop::RetriesExhausted {
                max_iterations,
                last_error,
            } => write!(
                f,
                "no passing validation after {max_iterations} iterations; last error: {last_error} \
                 (increase --max-iterations, fix the manifest, or check the tooling)"
            ),
            PhaseStop::RetryDeclined {
                iteration,
                last_error,
            } => write!(
                f,
                "stopped after iteration {iteration} without retrying; last error: {last_error}"
            ),
            PhaseStop::Systemic { explanation, .. } => write!(
                f,
                "systemic failure: {explanation}; fix the environment and rerun"
            ),
        }
    }
}

/// Summary of one loop invocation.
#[derive(Debug, Clone)]
pub struct PhaseOutcome {
    pub phase: PhaseKind,
    /// Iterations actually executed.
    pub iterations: u32,
    /// Every file the loop wrote, across all iterations.
    pub files_written: Vec<PathBuf>,
    pub stop: PhaseStop,
}

impl PhaseOutcome {
    pub fn success(&self) -> bool {
        self.stop.is_success()
    }
}

/// How one iteration ended, before the retry decision.
enum IterationEnd {
    Passed,
    /// The generation adapter failed; its error text goes through the
    /// classifier (the generation tool's own timeout is systemic).
    GenerationFailed { error: String },
    /// A produced file failed the path guard or size cap. Nothing was
    /// written this iteration; not a classifier input.
    ApplyRejected { error: String },
    /// Validation ran and failed; the diagnostic goes through the
    /// classifier and becomes the next iteration's feedback.
    ValidationFailed { diagnostic: String, summary: String },
}

struct IterationReport {
    generation_success: bool,
    files: Vec<PathBuf>,
    validation: Option<ValidationResult>,
    end: IterationEnd,
}

/// Execute one phase until validation passes, the budget runs out, the
/// retry policy stops the loop, or a systemic failure aborts it.
///
/// The backup snapshot is taken before iteration 1 and destroyed on every
/// exit path; `Err` is reserved for loop-internal failures (unreadable
/// manifest, broken validator setup), which abort conservatively.
#[instrument(skip_all, fields(phase = spec.kind.as_str(), max_iterations = options.max_iterations))]
pub fn run_phase<G: Generator, V: Validator, C: RetryConfirmer>(
    root: &Path,
    manifest_path: &Path,
    spec: &PhaseSpec,
    options: &LoopOptions,
    generator: &G,
    validator: &V,
    confirmer: &mut C,
) -> Result<PhaseOutcome> {
    let guard = PathGuard::new(root)?;
    let dirs = WorkDirs::new(root);
    let live = LiveWriter;
    let null = NullWriter;
    let writer: &dyn WorkspaceWriter = if options.dry_run { &null } else { &live };

    let mut backup = if options.dry_run {
        FileBackup::disabled()
    } else {
        FileBackup::new()
    };
    if spec.kind.backup_applies() {
        let manifest = load_manifest(manifest_path)?;
        let targets = backup_targets(&manifest, spec.kind, manifest_path, &guard)?;
        backup.backup(&targets)?;
    }

    let mut feedback = String::new();
    if spec.kind.red_check() {
        let result = validator.validate(manifest_path)?;
        if result.success {
            warn!("validation already passes before any generation");
        } else {
            feedback = result.diagnostic();
        }
    }

    let mut iteration = 0u32;
    let mut last_error = String::new();
    let mut files_written: BTreeSet<PathBuf> = BTreeSet::new();

    let stop = loop {
        if iteration >= options.max_iterations {
            break PhaseStop::RetriesExhausted {
                max_iterations: options.max_iterations,
                last_error: last_error.clone(),
            };
        }
        iteration += 1;
        let iter_start = Instant::now();

        if spec.kind.backup_applies()
            && should_restore_files(iteration, options.error_context_mode)
        {
            info!(iteration, "restoring pre-loop snapshot");
            backup.restore()?;
        }

        let request = GenerateRequest {
            manifest_path: manifest_path.to_path_buf(),
            phase: spec.kind,
            feedback: feedback.clone(),
            instructions: spec.instructions.clone(),
            iteration,
        };
        info!(iteration, "generation attempt");
        let report = run_iteration(manifest_path, &guard, writer, generator, validator, &request, options)?;
        files_written.extend(report.files.iter().cloned());

        let (decision, systemic, next_stop) = decide(iteration, options, &report.end, confirmer);
        if !options.dry_run {
            let meta = IterationMeta {
                phase: spec.kind,
                iteration,
                generation_success: report.generation_success,
                files_written: report.files.len(),
                validation_success: report.validation.as_ref().map(|v| v.success),
                systemic,
                decision,
                duration_ms: iter_start.elapsed().as_millis() as u64,
            };
            let validation_log = report.validation.as_ref().map(ValidationResult::diagnostic);
            write_iteration(&IterationWriteRequest {
                dirs: &dirs,
                meta: &meta,
                validation_log: validation_log.as_deref(),
                error: iteration_error(&report.end),
            })?;
        }

        match &report.end {
            IterationEnd::Passed => break PhaseStop::Passed,
            IterationEnd::ValidationFailed { diagnostic, summary } => {
                feedback = diagnostic.clone();
                last_error = summary.clone();
            }
            IterationEnd::GenerationFailed { error }
            | IterationEnd::ApplyRejected { error } => {
                last_error = error.clone();
            }
        }
        if let Some(stop) = next_stop {
            break stop;
        }
        debug!(iteration, "retrying");
    };

    backup.cleanup();
    info!(iterations = iteration, stop = %stop, "phase finished");
    Ok(PhaseOutcome {
        phase: spec.kind,
        iterations: iteration,
        files_written: files_written.into_iter().collect(),
        stop,
    })
}

/// Run the produce → apply → validate part of one iteration.
fn run_iteration<G: Generator, V: Validator>(
    manifest_path: &Path,
    guard: &PathGuard,
    writer: &dyn WorkspaceWriter,
    generator: &G,
    validator: &V,
    request: &GenerateRequest,
    options: &LoopOptions,
) -> Result<IterationReport> {
    let outcome = match generator.produce(request) {
        Ok(outcome) if outcome.success => outcome,
        Ok(outcome) => {
            let error = outcome
                .error
                .unwrap_or_else(|| "generation reported failure without detail".to_string());
            return Ok(IterationReport {
                generation_success: false,
                files: Vec::new(),
                validation: None,
                end: IterationEnd::GenerationFailed { error },
            });
        }
        Err(err) => {
            return Ok(IterationReport {
                generation_success: false,
                files: Vec::new(),
                validation: None,
                end: IterationEnd::GenerationFailed {
                    error: format!("{err:#}"),
                },
            });
        }
    };

    let files = match apply_files(guard, writer, &outcome.files, options.max_file_bytes) {
        Ok(files) => files,
        Err(err) => {
            return Ok(IterationReport {
                generation_success: true,
                files: Vec::new(),
                validation: None,
                end: IterationEnd::ApplyRejected {
                    error: format!("{err:#}"),
                },
            });
        }
    };

    let result = validator.validate(manifest_path)?;
    if result.success {
        return Ok(IterationReport {
            generation_success: true,
            files,
            validation: Some(result),
            end: IterationEnd::Passed,
        });
    }
    let diagnostic = result.diagnostic();
    let summary = result
        .errors
        .first()
        .cloned()
        .unwrap_or_else(|| "validation failed".to_string());
    Ok(IterationReport {
        generation_success: true,
        files,
        validation: Some(result),
        end: IterationEnd::ValidationFailed { diagnostic, summary },
    })
}

/// Classify the failure and consult the retry policy.
///
/// Classification runs first: a systemic failure stops the loop before any
/// operator prompt, regardless of retry mode or remaining budget.
fn decide(
    iteration: u32,
    options: &LoopOptions,
    end: &IterationEnd,
    confirmer: &mut dyn RetryConfirmer,
) -> (IterationDecision, bool, Option<PhaseStop>) {
    let (error, classifier_input) = match end {
        IterationEnd::Passed => return (IterationDecision::StopSuccess, false, None),
        IterationEnd::GenerationFailed { error } => (error.as_str(), Some(error.as_str())),
        IterationEnd::ApplyRejected { error } => (error.as_str(), None),
        IterationEnd::ValidationFailed { diagnostic, summary } => {
            (summary.as_str(), Some(diagnostic.as_str()))
        }
    };

    if let Some(input) = classifier_input
        && let Some(signature) = classify(input)
    {
        warn!(explanation = signature.explanation, "systemic failure, aborting loop");
        return (
            IterationDecision::StopFailure,
            true,
            Some(PhaseStop::Systemic {
                explanation: signature.explanation.to_string(),
                diagnostic: input.to_string(),
            }),
        );
    }

    if should_retry(
        iteration,
        options.max_iterations,
        options.retry_mode,
        error,
        confirmer,
    ) {
        (IterationDecision::Retry, false, None)
    } else {
        let stop = if iteration >= options.max_iterations {
            PhaseStop::RetriesExhausted {
                max_iterations: options.max_iterations,
                last_error: error.to_string(),
            }
        } else {
            PhaseStop::RetryDeclined {
                iteration,
                last_error: error.to_string(),
            }
        };
        (IterationDecision::StopFailure, false, Some(stop))
    }
}

fn iteration_error(end: &IterationEnd) -> Option<&str> {
    match end {
        IterationEnd::Passed => None,
        IterationEnd::GenerationFailed { error } | IterationEnd::ApplyRejected { error } => {
            Some(error)
        }
        IterationEnd::ValidationFailed { .. } => None,
    }
}

/// Resolve and size-check every produced file, then write them all.
///
/// All-or-nothing per iteration: the checks run in a first pass so a single
/// escaping path or oversized file means nothing is written.
fn apply_files(
    guard: &PathGuard,
    writer: &dyn WorkspaceWriter,
    files: &[GeneratedFile],
    max_file_bytes: usize,
) -> Result<Vec<PathBuf>> {
    let mut resolved = Vec::with_capacity(files.len());
    for file in files {
        let path = guard
            .resolve(&file.path)
            .with_context(|| format!("refusing to write '{}'", file.path))?;
        if file.content.len() > max_file_bytes {
            return Err(anyhow!(
                "generated file '{}' is {} bytes, over the {} byte limit",
                file.path,
                file.content.len(),
                max_file_bytes
            ));
        }
        resolved.push(path);
    }
    for (file, path) in files.iter().zip(&resolved) {
        writer.write_file(path, &file.content)?;
        debug!(path = %path.display(), bytes = file.content.len(), "wrote generated file");
    }
    Ok(resolved)
}

/// The file set a phase snapshots before iteration 1.
///
/// Manifest-editing phases snapshot the manifest itself; code phases
/// snapshot everything the generator may touch, including declared-creatable
/// files (recorded as absent so restore deletes them).
fn backup_targets(
    manifest: &Manifest,
    kind: PhaseKind,
    manifest_path: &Path,
    guard: &PathGuard,
) -> Result<Vec<PathBuf>> {
    if kind.mutates_manifest() {
        return Ok(vec![manifest_path.to_path_buf()]);
    }
    let mut targets = BTreeSet::new();
    for path in manifest
        .editable_files
        .iter()
        .chain(manifest.creatable_files.iter())
        .chain(std::iter::once(&manifest.expected_artifacts.file))
    {
        targets.insert(guard.resolve(path)?);
    }
    Ok(targets.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::GenerateOutcome;
    use crate::test_support::{ScriptedConfirmer, ScriptedGenerator, ScriptedValidator, TestProject};

    fn options(max_iterations: u32, retry_mode: RetryMode) -> LoopOptions {
        LoopOptions {
            max_iterations,
            retry_mode,
            ..LoopOptions::default()
        }
    }

    fn failing(diagnostic: &str) -> ValidationResult {
        ValidationResult {
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            errors: vec![diagnostic.to_string()],
        }
    }

    fn generated(path: &str, content: &str) -> GenerateOutcome {
        GenerateOutcome {
            success: true,
            files: vec![GeneratedFile {
                path: path.to_string(),
                content: content.to_string(),
            }],
            error: None,
        }
    }

    /// Verifies the loop retries after a failed validation and stops on the
    /// first pass.
    #[test]
    fn fails_then_passes_on_the_second_iteration() {
        let project = TestProject::new().expect("project");
        let generator = ScriptedGenerator::new(vec![
            Ok(generated("src/app.py", "def health(): pass\n")),
            Ok(generated("src/app.py", "def health(): return {}\n")),
        ]);
        let validator = ScriptedValidator::new(vec![
            Ok(failing("AssertionError: expected dict")),
            Ok(ValidationResult::passed()),
        ]);
        let mut confirmer = ScriptedConfirmer::default();

        let outcome = run_phase(
            project.root(),
            &project.manifest_path(),
            &PhaseSpec::new(PhaseKind::Refactor),
            &options(5, RetryMode::Auto),
            &generator,
            &validator,
            &mut confirmer,
        )
        .expect("run");

        assert!(outcome.success());
        assert_eq!(outcome.iterations, 2);
        assert_eq!(generator.calls(), 2);
    }

    /// Disabled retry means exactly one generation attempt no matter the
    /// remaining budget.
    #[test]
    fn disabled_retry_stops_after_one_attempt() {
        let project = TestProject::new().expect("project");
        let generator = ScriptedGenerator::new(vec![
            Ok(generated("src/app.py", "x\n")),
            Ok(generated("src/app.py", "y\n")),
        ]);
        let validator = ScriptedValidator::new(vec![
            Ok(failing("AssertionError: nope")),
            Ok(ValidationResult::passed()),
        ]);
        let mut confirmer = ScriptedConfirmer::default();

        let outcome = run_phase(
            project.root(),
            &project.manifest_path(),
            &PhaseSpec::new(PhaseKind::Refactor),
            &options(5, RetryMode::Disabled),
            &generator,
            &validator,
            &mut confirmer,
        )
        .expect("run");

        assert!(!outcome.success());
        assert_eq!(outcome.iterations, 1);
        assert_eq!(generator.calls(), 1);
        assert!(matches!(
            outcome.stop,
            PhaseStop::RetryDeclined { iteration: 1, .. }
        ));
    }

    /// Exhausting the budget names the budget in the failure.
    #[test]
    fn exhausted_budget_names_the_iteration_count() {
        let project = TestProject::new().expect("project");
        let generator = ScriptedGenerator::repeat(generated("src/app.py", "x\n"));
        let validator = ScriptedValidator::repeat(failing("AssertionError: still wrong"));
        let mut confirmer = ScriptedConfirmer::default();

        let outcome = run_phase(
            project.root(),
            &project.manifest_path(),
            &PhaseSpec::new(PhaseKind::Refactor),
            &options(3, RetryMode::Auto),
            &generator,
            &validator,
            &mut confirmer,
        )
        .expect("run");

        assert!(!outcome.success());
        assert_eq!(outcome.iterations, 3);
        assert!(outcome.stop.to_string().contains("3 iterations"));
        assert!(outcome.stop.to_string().contains("still wrong"));
    }

    /// A systemic diagnostic aborts immediately, bypassing remaining budget
    /// and never prompting the operator.
    #[test]
    fn systemic_failure_aborts_without_prompting() {
        let project = TestProject::new().expect("project");
        let generator = ScriptedGenerator::repeat(generated("src/app.py", "x\n"));
        let validator =
            ScriptedValidator::repeat(failing("ModuleNotFoundError: No module named 'flask'"));
        let mut confirmer = ScriptedConfirmer::always(true);

        let outcome = run_phase(
            project.root(),
            &project.manifest_path(),
            &PhaseSpec::new(PhaseKind::Refactor),
            &options(5, RetryMode::Confirm),
            &generator,
            &validator,
            &mut confirmer,
        )
        .expect("run");

        assert!(!outcome.success());
        assert_eq!(outcome.iterations, 1);
        assert!(matches!(outcome.stop, PhaseStop::Systemic { .. }));
        // Classification precedes the retry decision: no prompt was shown.
        assert_eq!(confirmer.asked(), 0);
    }

    /// A generation-tool timeout is systemic too.
    #[test]
    fn generation_timeout_is_systemic() {
        let project = TestProject::new().expect("project");
        let generator = ScriptedGenerator::new(vec![Err(anyhow!(
            "agent command timed out after 1200s"
        ))]);
        let validator = ScriptedValidator::repeat(ValidationResult::passed());
        let mut confirmer = ScriptedConfirmer::default();

        let outcome = run_phase(
            project.root(),
            &project.manifest_path(),
            &PhaseSpec::new(PhaseKind::Refactor),
            &options(5, RetryMode::Auto),
            &generator,
            &validator,
            &mut confirmer,
        )
        .expect("run");

        assert!(matches!(outcome.stop, PhaseStop::Systemic { .. }));
        assert_eq!(validator.calls(), 0);
    }

    /// An escaping path rejects the whole write set and records a local
    /// failure instead of crashing.
    #[test]
    fn escaping_path_is_a_local_failure_and_writes_nothing() {
        let project = TestProject::new().expect("project");
        let generator = ScriptedGenerator::new(vec![Ok(GenerateOutcome {
            success: true,
            files: vec![
                GeneratedFile {
                    path: "src/inside.py".to_string(),
                    content: "x = 1\n".to_string(),
                },
                GeneratedFile {
                    path: "../escape.py".to_string(),
                    content: "evil\n".to_string(),
                },
            ],
            error: None,
        })]);
        let validator = ScriptedValidator::repeat(ValidationResult::passed());
        let mut confirmer = ScriptedConfirmer::default();

        let outcome = run_phase(
            project.root(),
            &project.manifest_path(),
            &PhaseSpec::new(PhaseKind::Refactor),
            &options(1, RetryMode::Auto),
            &generator,
            &validator,
            &mut confirmer,
        )
        .expect("run");

        assert!(!outcome.success());
        assert!(outcome.files_written.is_empty());
        // The in-root sibling was rejected along with the escapee.
        assert!(!project.root().join("src/inside.py").exists());
        assert!(!project.root().join("../escape.py").exists());
        assert_eq!(validator.calls(), 0);
    }

    /// Oversized generated output is a local failure, not a crash.
    #[test]
    fn oversized_file_is_a_local_failure() {
        let project = TestProject::new().expect("project");
        let big = "x".repeat(64);
        let generator = ScriptedGenerator::new(vec![Ok(generated("src/app.py", &big))]);
        let validator = ScriptedValidator::repeat(ValidationResult::passed());
        let mut confirmer = ScriptedConfirmer::default();

        let outcome = run_phase(
            project.root(),
            &project.manifest_path(),
            &PhaseSpec::new(PhaseKind::Refactor),
            &LoopOptions {
                max_iterations: 1,
                max_file_bytes: 16,
                ..LoopOptions::default()
            },
            &generator,
            &validator,
            &mut confirmer,
        )
        .expect("run");

        assert!(!outcome.success());
        assert!(!project.root().join("src/app.py").exists());
    }

    /// Fresh-start restores the snapshot before the second attempt;
    /// incremental leaves the first attempt's files in place.
    #[test]
    fn fresh_start_restores_between_iterations() {
        let project = TestProject::new().expect("project");
        std::fs::write(project.root().join("src/app.py"), "original\n").expect("write");

        let generator = ScriptedGenerator::new(vec![
            Ok(generated("src/app.py", "attempt one\n")),
            // The second attempt writes nothing so the restored content
            // survives to the assertion below.
            Ok(GenerateOutcome {
                success: true,
                files: Vec::new(),
                error: None,
            }),
        ]);
        let validator = ScriptedValidator::new(vec![
            Ok(failing("AssertionError: wrong")),
            Ok(ValidationResult::passed()),
        ]);
        let mut confirmer = ScriptedConfirmer::default();

        let outcome = run_phase(
            project.root(),
            &project.manifest_path(),
            &PhaseSpec::new(PhaseKind::Refactor),
            &LoopOptions {
                max_iterations: 5,
                error_context_mode: ErrorContextMode::FreshStart,
                ..LoopOptions::default()
            },
            &generator,
            &validator,
            &mut confirmer,
        )
        .expect("run");

        assert!(outcome.success());
        let contents = std::fs::read_to_string(project.root().join("src/app.py")).expect("read");
        assert_eq!(contents, "original\n");
    }

    /// Confirm mode retries only while the operator says yes.
    #[test]
    fn confirm_mode_stops_when_the_operator_declines() {
        let project = TestProject::new().expect("project");
        let generator = ScriptedGenerator::repeat(generated("src/app.py", "x\n"));
        let validator = ScriptedValidator::repeat(failing("AssertionError: nope"));
        let mut confirmer = ScriptedConfirmer::new(vec![true, false]);

        let outcome = run_phase(
            project.root(),
            &project.manifest_path(),
            &PhaseSpec::new(PhaseKind::Refactor),
            &options(10, RetryMode::Confirm),
            &generator,
            &validator,
            &mut confirmer,
        )
        .expect("run");

        assert!(!outcome.success());
        assert_eq!(outcome.iterations, 2);
        assert_eq!(confirmer.asked(), 2);
        assert!(matches!(
            outcome.stop,
            PhaseStop::RetryDeclined { iteration: 2, .. }
        ));
    }

    /// The red check seeds the first iteration's feedback with the failing
    /// diagnostic.
    #[test]
    fn red_check_seeds_first_iteration_feedback() {
        let project = TestProject::new().expect("project");
        let generator = ScriptedGenerator::repeat(generated("src/app.py", "def health(): pass\n"));
        let validator = ScriptedValidator::new(vec![
            // Red check run.
            Ok(failing("AssertionError: health missing")),
            // Post-generation run.
            Ok(ValidationResult::passed()),
        ]);
        let mut confirmer = ScriptedConfirmer::default();

        let outcome = run_phase(
            project.root(),
            &project.manifest_path(),
            &PhaseSpec::new(PhaseKind::Implement),
            &options(3, RetryMode::Auto),
            &generator,
            &validator,
            &mut confirmer,
        )
        .expect("run");

        assert!(outcome.success());
        assert_eq!(outcome.iterations, 1);
        let first = generator.requests().remove(0);
        assert!(first.feedback.contains("health missing"));
    }

    /// Dry run touches nothing: no writes, no backup, no iteration logs.
    #[test]
    fn dry_run_writes_nothing() {
        let project = TestProject::new().expect("project");
        let generator = ScriptedGenerator::repeat(generated("src/app.py", "x\n"));
        let validator = ScriptedValidator::repeat(ValidationResult::passed());
        let mut confirmer = ScriptedConfirmer::default();

        let outcome = run_phase(
            project.root(),
            &project.manifest_path(),
            &PhaseSpec::new(PhaseKind::Refactor),
            &LoopOptions {
                dry_run: true,
                ..LoopOptions::default()
            },
            &generator,
            &validator,
            &mut confirmer,
        )
        .expect("run");

        assert!(outcome.success());
        assert!(!project.root().join("src/app.py").exists());
        assert!(!project.root().join(".greenloop/iterations").exists());
    }
}
