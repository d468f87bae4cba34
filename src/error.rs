//! Error types for the phase handoff coordinator
//!
//! This module provides structured error definitions using thiserror; the
//! binary propagates them through anyhow.

use crate::coordination::Phase;
use thiserror::Error;

/// Main error type for handoff operations
#[derive(Error, Debug)]
pub enum HandoffError {
    /// A wait or sleep was interrupted by a cancellation request
    #[error("Operation cancelled")]
    Cancelled,

    /// Strict alternation refused entering the phase that is already active
    #[error("Already in phase {0}")]
    AlreadyInPhase(Phase),

    /// The coordinator lock was poisoned by a panicking holder
    #[error("Handoff state lock poisoned")]
    LockPoisoned,

    /// Configuration loading failed
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration values are out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A worker returned an error or panicked
    #[error("Worker {id} failed: {reason}")]
    Worker { id: String, reason: String },

    /// Workers did not report their exit in time
    #[error("Shutdown timed out with {pending} worker(s) still running")]
    ShutdownTimeout { pending: usize },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl HandoffError {
    /// True for the expected cancellation unwind
    pub fn is_cancelled(&self) -> bool {
        matches!(self, HandoffError::Cancelled)
    }
}

/// Result type alias for handoff operations
pub type Result<T> = std::result::Result<T, HandoffError>;

/// Convert anyhow::Error to HandoffError
impl From<anyhow::Error> for HandoffError {
    fn from(err: anyhow::Error) -> Self {
        HandoffError::Other(err.to_string())
    }
}
