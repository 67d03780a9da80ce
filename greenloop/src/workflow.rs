//! Multi-phase workflow sequencing: planning → implementation →
//! (refactoring).

use std::fmt;
use std::path::Path;

use anyhow::Result;
use tracing::info;

use crate::core::retry::RetryConfirmer;
use crate::core::types::PhaseKind;
use crate::io::agent::Generator;
use crate::io::validator::Validator;
use crate::phase::{LoopOptions, PhaseOutcome, PhaseSpec, run_phase};

/// Workflow state machine. Any phase failure transitions straight to
/// [`WorkflowState::Failed`]; terminal states are `Complete` and `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Init,
    Planning,
    Implementing,
    Refactoring,
    Complete,
    Failed,
}

impl WorkflowState {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowState::Complete | WorkflowState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowState::Init => "init",
            WorkflowState::Planning => "planning",
            WorkflowState::Implementing => "implementing",
            WorkflowState::Refactoring => "refactoring",
            WorkflowState::Complete => "complete",
            WorkflowState::Failed => "failed",
        }
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct WorkflowOptions {
    /// Run the refactoring phase after implementation succeeds.
    pub refactor: bool,
    /// Operator instructions threaded into every phase.
    pub instructions: String,
}

/// Result of a full workflow run: the terminal state and each phase's
/// outcome in execution order.
#[derive(Debug, Clone)]
pub struct WorkflowOutcome {
    pub state: WorkflowState,
    pub phases: Vec<PhaseOutcome>,
}

impl WorkflowOutcome {
    pub fn success(&self) -> bool {
        self.state == WorkflowState::Complete
    }

    pub fn last_phase(&self) -> Option<&PhaseOutcome> {
        self.phases.last()
    }
}

/// Run the full workflow against one manifest path.
///
/// Planning authors the manifest (validated structurally); implementation
/// and optional refactoring run against the behavioral gate. The first
/// failing phase short-circuits to `Failed`.
pub fn run_workflow<G: Generator, V: Validator, C: RetryConfirmer>(
    root: &Path,
    manifest_path: &Path,
    options: &WorkflowOptions,
    loop_options: &LoopOptions,
    generator: &G,
    plan_validator: &V,
    gate_validator: &V,
    confirmer: &mut C,
) -> Result<WorkflowOutcome> {
    let mut state = WorkflowState::Init;
    let mut phases = Vec::new();

    let mut sequence = vec![
        (PhaseKind::Plan, WorkflowState::Planning),
        (PhaseKind::Implement, WorkflowState::Implementing),
    ];
    if options.refactor {
        sequence.push((PhaseKind::Refactor, WorkflowState::Refactoring));
    }

    for (kind, next_state) in sequence {
        advance(&mut state, next_state);
        let validator: &V = if kind == PhaseKind::Plan {
            plan_validator
        } else {
            gate_validator
        };
        let spec = PhaseSpec {
            kind,
            instructions: options.instructions.clone(),
        };
        let outcome = run_phase(
            root,
            manifest_path,
            &spec,
            loop_options,
            generator,
            validator,
            confirmer,
        )?;
        let passed = outcome.success();
        phases.push(outcome);
        if !passed {
            advance(&mut state, WorkflowState::Failed);
            return Ok(WorkflowOutcome { state, phases });
        }
    }

    advance(&mut state, WorkflowState::Complete);
    Ok(WorkflowOutcome { state, phases })
}

fn advance(state: &mut WorkflowState, next: WorkflowState) {
    info!(from = state.as_str(), to = next.as_str(), "workflow transition");
    *state = next;
}
