//! Retry decision for a failed loop iteration.

use serde::{Deserialize, Serialize};

/// How the loop spends its remaining iteration budget after a failure.
///
/// Immutable for the lifetime of a loop invocation; supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryMode {
    /// Stop after the current iteration regardless of remaining budget.
    Disabled,
    /// Keep iterating while budget remains.
    Auto,
    /// Ask the operator before every retry.
    Confirm,
}

/// Operator prompt used by [`RetryMode::Confirm`].
///
/// The stdin-backed implementation lives in `io::confirm`; tests inject
/// scripted answers. A decline, EOF, or interrupt all read as "do not retry".
pub trait RetryConfirmer {
    fn confirm_retry(&mut self, iteration: u32, last_error: &str) -> bool;
}

/// Confirmer for modes that never prompt. Answers are unreachable in
/// [`RetryMode::Disabled`] and [`RetryMode::Auto`]; this one declines if
/// asked anyway.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverConfirm;

impl RetryConfirmer for NeverConfirm {
    fn confirm_retry(&mut self, _iteration: u32, _last_error: &str) -> bool {
        false
    }
}

/// Decide whether the loop may run another iteration after a failure.
///
/// The budget check is unconditional: once `iteration >= max_iterations` no
/// mode can continue. `Confirm` blocks on the injected prompt.
pub fn should_retry(
    iteration: u32,
    max_iterations: u32,
    mode: RetryMode,
    last_error: &str,
    confirmer: &mut dyn RetryConfirmer,
) -> bool {
    if iteration >= max_iterations {
        return false;
    }
    match mode {
        RetryMode::Disabled => false,
        RetryMode::Auto => true,
        RetryMode::Confirm => confirmer.confirm_retry(iteration, last_error),
    }
}
