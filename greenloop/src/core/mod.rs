//! Pure decision logic for the phase loop.
//!
//! Everything in this module is deterministic and free of I/O so the loop's
//! retry, restore, and abort decisions can be tested in isolation.

pub mod classifier;
pub mod error_context;
pub mod path_guard;
pub mod retry;
pub mod types;
