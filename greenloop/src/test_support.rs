//! Test-only helpers: scripted adapters and a tempdir-backed project.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::core::retry::RetryConfirmer;
use crate::core::types::{GenerateOutcome, ValidationResult};
use crate::io::agent::{GenerateRequest, Generator};
use crate::io::validator::Validator;
use crate::manifest::{ArtifactSpec, ExpectedArtifacts, Manifest, write_manifest};

/// Generator that replays a script of outcomes without spawning processes.
///
/// Records every request so tests can assert on feedback threading. When the
/// script runs dry it falls back to the `repeat` outcome, or errors.
pub struct ScriptedGenerator {
    script: RefCell<VecDeque<Result<GenerateOutcome>>>,
    repeat: Option<GenerateOutcome>,
    requests: RefCell<Vec<GenerateRequest>>,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Result<GenerateOutcome>>) -> Self {
        Self {
            script: RefCell::new(script.into_iter().collect()),
            repeat: None,
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Return the same outcome on every call.
    pub fn repeat(outcome: GenerateOutcome) -> Self {
        Self {
            script: RefCell::new(VecDeque::new()),
            repeat: Some(outcome),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> u32 {
        self.requests.borrow().len() as u32
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.borrow().clone()
    }
}

impl Generator for ScriptedGenerator {
    fn produce(&self, request: &GenerateRequest) -> Result<GenerateOutcome> {
        self.requests.borrow_mut().push(request.clone());
        if let Some(next) = self.script.borrow_mut().pop_front() {
            return next;
        }
        self.repeat
            .clone()
            .ok_or_else(|| anyhow!("scripted generator ran out of outcomes"))
    }
}

/// Validator that replays a script of results.
pub struct ScriptedValidator {
    script: RefCell<VecDeque<Result<ValidationResult>>>,
    repeat: Option<ValidationResult>,
    calls: RefCell<u32>,
}

impl ScriptedValidator {
    pub fn new(script: Vec<Result<ValidationResult>>) -> Self {
        Self {
            script: RefCell::new(script.into_iter().collect()),
            repeat: None,
            calls: RefCell::new(0),
        }
    }

    pub fn repeat(result: ValidationResult) -> Self {
        Self {
            script: RefCell::new(VecDeque::new()),
            repeat: Some(result),
            calls: RefCell::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        *self.calls.borrow()
    }
}

impl Validator for ScriptedValidator {
    fn validate(&self, _manifest_path: &Path) -> Result<ValidationResult> {
        *self.calls.borrow_mut() += 1;
        if let Some(next) = self.script.borrow_mut().pop_front() {
            return next;
        }
        self.repeat
            .clone()
            .ok_or_else(|| anyhow!("scripted validator ran out of results"))
    }
}

/// Confirmer that replays scripted answers; declines once the script runs
/// dry unless constructed with [`ScriptedConfirmer::always`].
#[derive(Debug, Default)]
pub struct ScriptedConfirmer {
    answers: VecDeque<bool>,
    fallback: bool,
    asked: u32,
}

impl ScriptedConfirmer {
    pub fn new(answers: Vec<bool>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
            fallback: false,
            asked: 0,
        }
    }

    pub fn always(answer: bool) -> Self {
        Self {
            answers: VecDeque::new(),
            fallback: answer,
            asked: 0,
        }
    }

    pub fn asked(&self) -> u32 {
        self.asked
    }
}

impl RetryConfirmer for ScriptedConfirmer {
    fn confirm_retry(&mut self, _iteration: u32, _last_error: &str) -> bool {
        self.asked += 1;
        self.answers.pop_front().unwrap_or(self.fallback)
    }
}

/// Tempdir-backed project root with a valid manifest already on disk.
pub struct TestProject {
    temp: TempDir,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp = TempDir::new()?;
        fs::create_dir_all(temp.path().join("src"))?;
        let project = Self { temp };
        write_manifest(&project.manifest_path(), &project.default_manifest())?;
        Ok(project)
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.temp.path().join("manifest.json")
    }

    pub fn default_manifest(&self) -> Manifest {
        Manifest {
            goal: "expose a health endpoint".to_string(),
            description: "GET /health returns an empty dict".to_string(),
            task_type: "feature".to_string(),
            creatable_files: vec!["src/app.py".to_string()],
            editable_files: Vec::new(),
            readonly_files: vec!["tests/test_app.py".to_string()],
            expected_artifacts: ExpectedArtifacts {
                file: "src/app.py".to_string(),
                contains: vec![ArtifactSpec {
                    kind: "function".to_string(),
                    name: "health".to_string(),
                    args: Vec::new(),
                    returns: Some("dict".to_string()),
                    class: None,
                    bases: Vec::new(),
                    attribute_type: None,
                    description: None,
                }],
            },
            validation_command: vec!["true".to_string()],
        }
    }

    pub fn write_manifest(&self, manifest: &Manifest) -> Result<()> {
        write_manifest(&self.manifest_path(), manifest)
    }
}
