//! Snapshot and restore of the working file set across retry iterations.
//!
//! One backup per loop invocation: the snapshot is taken before iteration 1,
//! restored per the error-context policy, and destroyed when the loop exits.
//! The temp store is private to the owning loop and removed on every exit
//! path (explicit [`FileBackup::cleanup`] plus the `Drop` safety net).

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;
use tracing::{debug, warn};

#[derive(Debug)]
enum Entry {
    /// Original bytes live at this path inside the temp store.
    Saved(PathBuf),
    /// The file did not exist at backup time; restore deletes it.
    Absent,
}

#[derive(Debug)]
struct Store {
    temp: TempDir,
    entries: BTreeMap<PathBuf, Entry>,
}

/// Point-in-time capture of a file set's contents (or absence).
///
/// [`FileBackup::disabled`] yields a no-op instance for dry runs: every
/// operation succeeds without touching the filesystem and the backup never
/// reports itself active.
#[derive(Debug)]
pub struct FileBackup {
    enabled: bool,
    store: Option<Store>,
}

impl FileBackup {
    pub fn new() -> Self {
        Self {
            enabled: true,
            store: None,
        }
    }

    /// No-op instance: backup, restore, and cleanup all succeed without
    /// touching the filesystem.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            store: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.store.is_some()
    }

    /// Snapshot the given absolute paths into a private temp store.
    ///
    /// Existing files are copied byte-for-byte; missing files are recorded
    /// as absent so a later restore deletes whatever was generated there.
    /// A second backup on the same instance is a caller bug and errors.
    pub fn backup(&mut self, paths: &[PathBuf]) -> Result<()> {
        if !self.enabled {
            debug!("dry run: skipping backup of {} paths", paths.len());
            return Ok(());
        }
        if self.store.is_some() {
            return Err(anyhow!("backup already active for this loop"));
        }

        let temp = TempDir::new().context("create backup store")?;
        let mut entries = BTreeMap::new();
        for (index, original) in paths.iter().enumerate() {
            if original.exists() {
                let saved = temp.path().join(index.to_string());
                fs::copy(original, &saved)
                    .with_context(|| format!("back up {}", original.display()))?;
                entries.insert(original.clone(), Entry::Saved(saved));
            } else {
                entries.insert(original.clone(), Entry::Absent);
            }
        }
        debug!(files = entries.len(), "backup snapshot taken");
        self.store = Some(Store { temp, entries });
        Ok(())
    }

    /// Put every tracked path back to its snapshot state.
    ///
    /// Repeatable: the saved copies stay in the store, so each call replays
    /// the original snapshot, not the previous restore.
    pub fn restore(&self) -> Result<()> {
        if !self.enabled {
            debug!("dry run: skipping restore");
            return Ok(());
        }
        let Some(store) = &self.store else {
            return Err(anyhow!("no active backup to restore"));
        };

        for (original, entry) in &store.entries {
            match entry {
                Entry::Saved(saved) => {
                    if let Some(parent) = original.parent() {
                        fs::create_dir_all(parent)
                            .with_context(|| format!("create directory {}", parent.display()))?;
                    }
                    fs::copy(saved, original)
                        .with_context(|| format!("restore {}", original.display()))?;
                }
                Entry::Absent => {
                    if original.exists() {
                        fs::remove_file(original)
                            .with_context(|| format!("remove {}", original.display()))?;
                    }
                }
            }
        }
        debug!(files = store.entries.len(), "snapshot restored");
        Ok(())
    }

    /// Drop the temp store and all tracked state.
    ///
    /// Idempotent and infallible: repeated calls, calls with no active
    /// backup, and an externally removed store all log and continue.
    pub fn cleanup(&mut self) {
        let Some(store) = self.store.take() else {
            return;
        };
        if let Err(err) = store.temp.close() {
            warn!(err = %err, "backup store already gone or not removable");
        }
    }
}

impl Default for FileBackup {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FileBackup {
    fn drop(&mut self) {
        self.cleanup();
    }
}
