//! End-to-end loop scenarios: scripted generator, real validation gate,
//! real file writes and backups.

use std::fs;
use std::time::Duration;

use greenloop::core::retry::RetryMode;
use greenloop::core::types::{GenerateOutcome, GeneratedFile, PhaseKind};
use greenloop::io::validator::GateValidator;
use greenloop::manifest::Manifest;
use greenloop::phase::{LoopOptions, PhaseSpec, PhaseStop, run_phase};
use greenloop::test_support::{ScriptedConfirmer, ScriptedGenerator, TestProject};

fn gate(project: &TestProject) -> GateValidator {
    GateValidator {
        root: project.root().to_path_buf(),
        behavioral: true,
        timeout: Duration::from_secs(10),
        output_limit_bytes: 100_000,
    }
}

fn manifest_with_command(project: &TestProject, command: &[&str]) -> Manifest {
    let mut manifest = project.default_manifest();
    manifest.validation_command = command.iter().map(|s| s.to_string()).collect();
    manifest
}

fn writes(path: &str, content: &str) -> GenerateOutcome {
    GenerateOutcome {
        success: true,
        files: vec![GeneratedFile {
            path: path.to_string(),
            content: content.to_string(),
        }],
        error: None,
    }
}

/// A wrong first attempt followed by a correct one passes on iteration 2
/// against the real gate.
#[test]
fn implement_passes_on_second_iteration_against_real_gate() {
    let project = TestProject::new().expect("project");
    let manifest = manifest_with_command(&project, &["sh", "-c", "grep -q 'return {}' src/app.py"]);
    project.write_manifest(&manifest).expect("manifest");

    let generator = ScriptedGenerator::new(vec![
        Ok(writes("src/app.py", "def health():\n    return None\n")),
        Ok(writes("src/app.py", "def health():\n    return {}\n")),
    ]);
    let mut confirmer = ScriptedConfirmer::default();

    let outcome = run_phase(
        project.root(),
        &project.manifest_path(),
        &PhaseSpec::new(PhaseKind::Implement),
        &LoopOptions {
            max_iterations: 5,
            ..LoopOptions::default()
        },
        &generator,
        &gate(&project),
        &mut confirmer,
    )
    .expect("run");

    assert!(outcome.success());
    assert_eq!(outcome.iterations, 2);
    let contents = fs::read_to_string(project.root().join("src/app.py")).expect("read");
    assert!(contents.contains("return {}"));

    // The red check ran before iteration 1 and seeded feedback.
    let first = generator.requests().remove(0);
    assert!(first.feedback.contains("does not exist"));
}

/// A systemic diagnostic from the real gate aborts the loop with budget
/// remaining.
#[test]
fn missing_module_aborts_the_loop() {
    let project = TestProject::new().expect("project");
    let manifest = manifest_with_command(
        &project,
        &[
            "sh",
            "-c",
            "echo \"E   ModuleNotFoundError: No module named 'flask'\" >&2; exit 1",
        ],
    );
    project.write_manifest(&manifest).expect("manifest");

    let generator =
        ScriptedGenerator::repeat(writes("src/app.py", "def health():\n    return {}\n"));
    let mut confirmer = ScriptedConfirmer::default();

    let outcome = run_phase(
        project.root(),
        &project.manifest_path(),
        &PhaseSpec::new(PhaseKind::Fix),
        &LoopOptions {
            max_iterations: 5,
            ..LoopOptions::default()
        },
        &generator,
        &gate(&project),
        &mut confirmer,
    )
    .expect("run");

    assert!(!outcome.success());
    assert_eq!(outcome.iterations, 1);
    let PhaseStop::Systemic { explanation, .. } = &outcome.stop else {
        panic!("expected systemic stop, got {:?}", outcome.stop);
    };
    assert!(explanation.contains("missing from the environment"));
}

/// Iteration artifacts land under `.greenloop/iterations/<phase>/<n>/`.
#[test]
fn iteration_logs_are_written_per_attempt() {
    let project = TestProject::new().expect("project");
    let manifest = manifest_with_command(&project, &["sh", "-c", "test -f src/app.py"]);
    project.write_manifest(&manifest).expect("manifest");

    let generator = ScriptedGenerator::new(vec![Ok(writes(
        "src/app.py",
        "def health():\n    return {}\n",
    ))]);
    let mut confirmer = ScriptedConfirmer::default();

    let outcome = run_phase(
        project.root(),
        &project.manifest_path(),
        &PhaseSpec::new(PhaseKind::Fix),
        &LoopOptions::default(),
        &generator,
        &gate(&project),
        &mut confirmer,
    )
    .expect("run");

    assert!(outcome.success());
    let meta = project
        .root()
        .join(".greenloop/iterations/fix/1/meta.json");
    assert!(meta.is_file());
    let raw = fs::read_to_string(meta).expect("read meta");
    assert!(raw.contains("\"decision\": \"stop_success\""));
}

/// Disabled retry against the real gate: one attempt, failure, and the
/// working tree keeps the attempt's files (incremental context).
#[test]
fn disabled_retry_keeps_partial_progress() {
    let project = TestProject::new().expect("project");
    let manifest = manifest_with_command(&project, &["false"]);
    project.write_manifest(&manifest).expect("manifest");

    let generator =
        ScriptedGenerator::repeat(writes("src/app.py", "def health():\n    return {}\n"));
    let mut confirmer = ScriptedConfirmer::default();

    let outcome = run_phase(
        project.root(),
        &project.manifest_path(),
        &PhaseSpec::new(PhaseKind::Fix),
        &LoopOptions {
            max_iterations: 4,
            retry_mode: RetryMode::Disabled,
            ..LoopOptions::default()
        },
        &generator,
        &gate(&project),
        &mut confirmer,
    )
    .expect("run");

    assert!(!outcome.success());
    assert_eq!(outcome.iterations, 1);
    assert!(project.root().join("src/app.py").exists());
}
