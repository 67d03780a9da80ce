//! Iteration artifacts under `.greenloop/iterations/`.
//!
//! Product output, written every iteration regardless of `RUST_LOG`; the
//! operator reads these to understand what each attempt did.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::types::{IterationDecision, PhaseKind};
use crate::io::layout::WorkDirs;

#[derive(Debug, Clone, Serialize)]
pub struct IterationMeta {
    pub phase: PhaseKind,
    /// Iteration number (1-indexed).
    pub iteration: u32,
    pub generation_success: bool,
    pub files_written: usize,
    /// Absent when the iteration failed before validation ran.
    pub validation_success: Option<bool>,
    pub systemic: bool,
    pub decision: IterationDecision,
    pub duration_ms: u64,
}

#[derive(Debug, Clone)]
pub struct IterationPaths {
    pub dir: PathBuf,
    pub meta_path: PathBuf,
    pub validation_log_path: PathBuf,
    pub error_log_path: PathBuf,
}

impl IterationPaths {
    pub fn new(dirs: &WorkDirs, phase: PhaseKind, iteration: u32) -> Self {
        let dir = dirs.iteration_dir(phase.as_str(), iteration);
        Self {
            meta_path: dir.join("meta.json"),
            validation_log_path: dir.join("validation.log"),
            error_log_path: dir.join("error.log"),
            dir,
        }
    }
}

pub struct IterationWriteRequest<'a> {
    pub dirs: &'a WorkDirs,
    pub meta: &'a IterationMeta,
    pub validation_log: Option<&'a str>,
    pub error: Option<&'a str>,
}

pub fn write_iteration(request: &IterationWriteRequest<'_>) -> Result<IterationPaths> {
    let paths = IterationPaths::new(request.dirs, request.meta.phase, request.meta.iteration);
    fs::create_dir_all(&paths.dir)
        .with_context(|| format!("create iteration dir {}", paths.dir.display()))?;

    // Write in deterministic order to keep logs stable.
    let mut buf = serde_json::to_string_pretty(request.meta).context("serialize meta")?;
    buf.push('\n');
    fs::write(&paths.meta_path, buf)
        .with_context(|| format!("write {}", paths.meta_path.display()))?;

    if let Some(log) = request.validation_log {
        fs::write(&paths.validation_log_path, log)
            .with_context(|| format!("write {}", paths.validation_log_path.display()))?;
    }
    if let Some(error) = request.error {
        fs::write(&paths.error_log_path, format!("{error}\n"))
            .with_context(|| format!("write {}", paths.error_log_path.display()))?;
    }

    Ok(paths)
}
