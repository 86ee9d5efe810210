//! Error types for relay
//!
//! Lifecycle outcomes of background tasks (spawn failures, non-zero exits,
//! cancellation races) are data on the task record, not errors. This type
//! covers the plumbing around them: configuration and runtime wiring.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// relay error type
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // Runtime / process
    // ========================================================================
    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Failed to spawn process: {0}")]
    Spawn(String),
}

impl Error {
    /// Wrap an I/O failure that happened while launching a command
    pub fn spawn(command: &str, err: std::io::Error) -> Self {
        Error::Spawn(format!("{}: {}", command, err))
    }
}
