//! CLI for the generate → validate → retry workflow driver.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use greenloop::core::error_context::ErrorContextMode;
use greenloop::core::retry::RetryMode;
use greenloop::core::types::PhaseKind;
use greenloop::exit_codes;
use greenloop::io::agent::CliGenerator;
use greenloop::io::config::{LoopConfig, load_config};
use greenloop::io::confirm::StdinConfirmer;
use greenloop::io::layout::WorkDirs;
use greenloop::io::validator::GateValidator;
use greenloop::logging;
use greenloop::phase::{LoopOptions, PhaseOutcome, PhaseSpec, run_phase};
use greenloop::workflow::{WorkflowOptions, run_workflow};

#[derive(Parser)]
#[command(
    name = "greenloop",
    version,
    about = "Iterative generate → validate → retry workflow driver"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct LoopArgs {
    /// Path to the work manifest, relative to the working directory.
    #[arg(long, default_value = "manifest.json")]
    manifest: PathBuf,

    /// Override the configured iteration budget.
    #[arg(long)]
    max_iterations: Option<u32>,

    /// Stop after the first iteration regardless of remaining budget.
    #[arg(long, conflicts_with = "confirm_retry")]
    no_retry: bool,

    /// Ask before every retry.
    #[arg(long)]
    confirm_retry: bool,

    /// Restore the pre-loop snapshot before every retry instead of building
    /// on the previous attempt.
    #[arg(long)]
    fresh_start: bool,

    /// Extra instructions passed to the agent.
    #[arg(long, default_value = "")]
    instructions: String,

    /// Let the agent run without sandbox restrictions.
    #[arg(long)]
    bypass_permissions: bool,

    /// Go through the motions without writing any file.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Author a manifest from a high-level goal.
    Plan {
        goal: String,
        #[command(flatten)]
        args: LoopArgs,
    },
    /// Review and amend an existing manifest.
    ReviewPlan {
        #[command(flatten)]
        args: LoopArgs,
    },
    /// Author behavioral tests for the manifest's artifacts.
    GenerateTest {
        #[command(flatten)]
        args: LoopArgs,
    },
    /// Implement the declared artifacts until validation passes.
    Implement {
        #[command(flatten)]
        args: LoopArgs,
    },
    /// Restructure passing code without changing behavior.
    Refactor {
        #[command(flatten)]
        args: LoopArgs,
    },
    /// Refine the manifest in place.
    Refine {
        #[command(flatten)]
        args: LoopArgs,
    },
    /// Repair a failing validation against an existing manifest.
    Fix {
        #[command(flatten)]
        args: LoopArgs,
    },
    /// Run the full workflow: plan, implement, optionally refactor.
    Run {
        goal: String,
        /// Also run the refactoring phase after implementation.
        #[arg(long)]
        refactor: bool,
        #[command(flatten)]
        args: LoopArgs,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(true) => std::process::exit(exit_codes::OK),
        Ok(false) => std::process::exit(exit_codes::FAILED),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::FAILED);
        }
    }
}

fn run() -> Result<bool> {
    let cli = Cli::parse();
    let root = std::env::current_dir().context("resolve working directory")?;

    match cli.command {
        Command::Plan { goal, args } => phase_command(&root, PhaseKind::Plan, Some(goal), args),
        Command::ReviewPlan { args } => phase_command(&root, PhaseKind::ReviewPlan, None, args),
        Command::GenerateTest { args } => phase_command(&root, PhaseKind::GenerateTest, None, args),
        Command::Implement { args } => phase_command(&root, PhaseKind::Implement, None, args),
        Command::Refactor { args } => phase_command(&root, PhaseKind::Refactor, None, args),
        Command::Refine { args } => phase_command(&root, PhaseKind::Refine, None, args),
        Command::Fix { args } => phase_command(&root, PhaseKind::Fix, None, args),
        Command::Run { goal, refactor, args } => workflow_command(&root, goal, refactor, args),
    }
}

fn phase_command(
    root: &std::path::Path,
    kind: PhaseKind,
    goal: Option<String>,
    args: LoopArgs,
) -> Result<bool> {
    let dirs = WorkDirs::new(root);
    let cfg = load_config(&dirs.config_path)?;
    let options = loop_options(&cfg, &args);
    let manifest_path = root.join(&args.manifest);

    let generator = generator(&cfg, dirs, &args);
    let validator = GateValidator {
        root: root.to_path_buf(),
        behavioral: behavioral(kind),
        timeout: Duration::from_secs(cfg.validation_timeout_secs),
        output_limit_bytes: cfg.output_limit_bytes,
    };
    let mut confirmer = StdinConfirmer;
    let spec = PhaseSpec {
        kind,
        instructions: join_instructions(goal, &args.instructions),
    };

    let outcome = run_phase(
        root,
        &manifest_path,
        &spec,
        &options,
        &generator,
        &validator,
        &mut confirmer,
    )?;
    report_phase(&outcome);
    Ok(outcome.success())
}

fn workflow_command(
    root: &std::path::Path,
    goal: String,
    refactor: bool,
    args: LoopArgs,
) -> Result<bool> {
    let dirs = WorkDirs::new(root);
    let cfg = load_config(&dirs.config_path)?;
    let options = loop_options(&cfg, &args);
    let manifest_path = root.join(&args.manifest);

    let generator = generator(&cfg, dirs, &args);
    let plan_validator = GateValidator {
        root: root.to_path_buf(),
        behavioral: false,
        timeout: Duration::from_secs(cfg.validation_timeout_secs),
        output_limit_bytes: cfg.output_limit_bytes,
    };
    let gate_validator = GateValidator {
        root: root.to_path_buf(),
        behavioral: true,
        timeout: Duration::from_secs(cfg.validation_timeout_secs),
        output_limit_bytes: cfg.output_limit_bytes,
    };
    let mut confirmer = StdinConfirmer;

    let outcome = run_workflow(
        root,
        &manifest_path,
        &WorkflowOptions {
            refactor,
            instructions: join_instructions(Some(goal), &args.instructions),
        },
        &options,
        &generator,
        &plan_validator,
        &gate_validator,
        &mut confirmer,
    )?;

    for phase in &outcome.phases {
        report_phase(phase);
    }
    println!("workflow: {}", outcome.state);
    Ok(outcome.success())
}

fn generator(cfg: &LoopConfig, dirs: WorkDirs, args: &LoopArgs) -> CliGenerator {
    CliGenerator::new(
        dirs,
        cfg.agent.command.clone(),
        Duration::from_secs(cfg.agent.timeout_secs),
        cfg.output_limit_bytes,
        args.bypass_permissions,
    )
}

fn loop_options(cfg: &LoopConfig, args: &LoopArgs) -> LoopOptions {
    let retry_mode = if args.no_retry {
        RetryMode::Disabled
    } else if args.confirm_retry {
        RetryMode::Confirm
    } else {
        RetryMode::Auto
    };
    let error_context_mode = if args.fresh_start {
        ErrorContextMode::FreshStart
    } else {
        ErrorContextMode::Incremental
    };
    LoopOptions {
        max_iterations: args.max_iterations.unwrap_or(cfg.max_iterations),
        retry_mode,
        error_context_mode,
        max_file_bytes: cfg.max_file_bytes,
        dry_run: args.dry_run,
    }
}

/// Manifest-editing and planning phases validate structure only; code
/// phases must also pass the behavioral gate.
fn behavioral(kind: PhaseKind) -> bool {
    matches!(
        kind,
        PhaseKind::Implement | PhaseKind::Refactor | PhaseKind::Fix
    )
}

fn join_instructions(goal: Option<String>, instructions: &str) -> String {
    match goal {
        Some(goal) if instructions.trim().is_empty() => goal,
        Some(goal) => format!("{goal}\n\n{instructions}"),
        None => instructions.to_string(),
    }
}

fn report_phase(outcome: &PhaseOutcome) {
    if outcome.success() {
        println!(
            "phase {}: validation passed after {} iteration(s), {} file(s) written",
            outcome.phase.as_str(),
            outcome.iterations,
            outcome.files_written.len()
        );
        for path in &outcome.files_written {
            println!("  {}", path.display());
        }
    } else {
        println!(
            "phase {}: failed after {} iteration(s): {}",
            outcome.phase.as_str(),
            outcome.iterations,
            outcome.stop
        );
    }
}
