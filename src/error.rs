//! Error types for the update engine.

use thiserror::Error;

/// Errors surfaced by the update pipeline and its collaborators.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Script storage failed (lookup or persistence).
    #[error("store error: {0}")]
    Store(String),

    /// Downloaded source could not be reparsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Auxiliary resource refresh failed (icons, requires).
    #[error("resource error: {0}")]
    Resource(String),

    /// The scheduler task rejected a request or has stopped.
    #[error("scheduler error: {0}")]
    Schedule(String),
}

/// Result type for update operations.
pub type Result<T> = std::result::Result<T, UpdateError>;
