//! Filesystem port for generated file writes.
//!
//! The loop writes through this port so dry runs swap in a no-op
//! implementation once at construction instead of checking a flag at every
//! write site.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

pub trait WorkspaceWriter {
    /// Write `contents` to an absolute, already-guarded path, creating
    /// parent directories as needed.
    fn write_file(&self, path: &Path, contents: &str) -> Result<()>;
}

/// Writes to the live project tree.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveWriter;

impl WorkspaceWriter for LiveWriter {
    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(path, contents).with_context(|| format!("write {}", path.display()))
    }
}

/// Dry-run writer: logs the would-be write and touches nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWriter;

impl WorkspaceWriter for NullWriter {
    fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        debug!(path = %path.display(), bytes = contents.len(), "dry run: skipping write");
        Ok(())
    }
}
