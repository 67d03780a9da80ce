//! Working-file policy for the start of a retry iteration.

use serde::{Deserialize, Serialize};

/// What the next generation attempt sees on disk after a failed iteration.
///
/// Immutable for the lifetime of a loop invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorContextMode {
    /// Each retry builds on the artifacts left by the previous attempt,
    /// preserving partial progress.
    Incremental,
    /// Each retry starts from the pristine pre-loop snapshot, discarding the
    /// previous attempt's edits.
    FreshStart,
}

/// Whether working files must be restored before this iteration runs.
///
/// Iteration 1 never restores (there is nothing to undo yet).
pub fn should_restore_files(iteration: u32, mode: ErrorContextMode) -> bool {
    if iteration <= 1 {
        return false;
    }
    matches!(mode, ErrorContextMode::FreshStart)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incremental_never_restores() {
        for iteration in 1..=10 {
            assert!(!should_restore_files(iteration, ErrorContextMode::Incremental));
        }
    }

    #[test]
    fn fresh_start_restores_from_the_second_iteration_on() {
        assert!(!should_restore_files(1, ErrorContextMode::FreshStart));
        assert!(should_restore_files(2, ErrorContextMode::FreshStart));
        assert!(should_restore_files(7, ErrorContextMode::FreshStart));
    }
}
