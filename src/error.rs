//! Crate-wide error type.
//!
//! Kept small on purpose: most failure modes below the [`Orchestrator`] are
//! recovered locally (a skipped root, a deleted file) and never surface as
//! an `Error` at all. What's left are the handful of conditions in §7 of the
//! design that are genuinely fatal.
//!
//! [`Orchestrator`]: crate::orchestrator::Orchestrator

use std::path::PathBuf;

/// Errors that can terminate the daemon.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Wraps an I/O failure that couldn't be handled locally.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The logging sink could not be initialized.
    #[error("failed to initialize logging: {0}")]
    LogInit(#[from] fern::InitError),

    /// A configuration argument was invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Construction finished without a single watchable path.
    #[error("no watchable path found among the configured roots: {0:?}")]
    NoWatchablePaths(Vec<PathBuf>),
}

/// Shorthand for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
