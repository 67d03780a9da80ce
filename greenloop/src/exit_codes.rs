//! Stable exit codes for CLI commands.

/// Phase or workflow succeeded.
pub const OK: i32 = 0;
/// Phase or workflow failed, or the command could not run.
pub const FAILED: i32 = 1;
