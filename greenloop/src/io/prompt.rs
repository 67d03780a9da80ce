//! Prompt rendering for the generation CLI.

use anyhow::Result;
use minijinja::{Environment, context};

use crate::core::types::PhaseKind;

const PLAN_TEMPLATE: &str = include_str!("prompts/plan.md");
const REVIEW_PLAN_TEMPLATE: &str = include_str!("prompts/review_plan.md");
const GENERATE_TEST_TEMPLATE: &str = include_str!("prompts/generate_test.md");
const IMPLEMENT_TEMPLATE: &str = include_str!("prompts/implement.md");
const REFACTOR_TEMPLATE: &str = include_str!("prompts/refactor.md");
const REFINE_TEMPLATE: &str = include_str!("prompts/refine.md");
const FIX_TEMPLATE: &str = include_str!("prompts/fix.md");

/// Inputs for one generation prompt.
#[derive(Debug, Clone, Default)]
pub struct PromptInputs {
    /// Pretty-printed manifest JSON, absent for the planning phase's first
    /// run.
    pub manifest: Option<String>,
    /// Diagnostic text from the previous failed validation.
    pub feedback: Option<String>,
    /// Operator-supplied extra instructions.
    pub instructions: Option<String>,
    pub iteration: u32,
}

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        for (name, source) in [
            ("plan", PLAN_TEMPLATE),
            ("review-plan", REVIEW_PLAN_TEMPLATE),
            ("generate-test", GENERATE_TEST_TEMPLATE),
            ("implement", IMPLEMENT_TEMPLATE),
            ("refactor", REFACTOR_TEMPLATE),
            ("refine", REFINE_TEMPLATE),
            ("fix", FIX_TEMPLATE),
        ] {
            env.add_template(name, source)
                .expect("embedded template should be valid");
        }
        Self { env }
    }

    pub fn render(&self, phase: PhaseKind, inputs: &PromptInputs) -> Result<String> {
        let template = self.env.get_template(phase.as_str())?;
        let rendered = template.render(context! {
            manifest => inputs.manifest.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            feedback => inputs.feedback.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            instructions => inputs.instructions.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            iteration => inputs.iteration,
        })?;
        Ok(rendered)
    }
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}
