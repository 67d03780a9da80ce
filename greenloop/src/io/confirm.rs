//! Operator prompt for confirm-mode retries.

use std::io::{BufRead, Write};

use tracing::debug;

use crate::core::retry::RetryConfirmer;

/// Blocking stdin prompt.
///
/// Prints the question to stderr and reads one line. Only an explicit
/// `y`/`yes` continues; a decline, empty answer, EOF, or read error (e.g.
/// an interrupt closing stdin) all resolve to "do not retry".
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinConfirmer;

impl RetryConfirmer for StdinConfirmer {
    fn confirm_retry(&mut self, iteration: u32, last_error: &str) -> bool {
        let stderr = std::io::stderr();
        let mut out = stderr.lock();
        let _ = writeln!(out, "iteration {iteration} failed: {last_error}");
        let _ = write!(out, "retry? [y/N] ");
        let _ = out.flush();

        let stdin = std::io::stdin();
        let mut answer = String::new();
        match stdin.lock().read_line(&mut answer) {
            Ok(0) | Err(_) => {
                debug!("no answer from operator, not retrying");
                false
            }
            Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
        }
    }
}
