//! Outbox error types.

use thiserror::Error;

/// Outbox error type.
#[derive(Error, Debug)]
pub enum OutboxError {
    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("Send failed: HTTP {status}: {body}")]
    Send {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        body: String,
    },

    /// Backend accepted fewer records than the batch held.
    #[error("Backend accepted {accepted} of {expected} records")]
    PartialAcceptance {
        /// Records the backend reported as stored.
        accepted: usize,
        /// Records in the submitted batch.
        expected: usize,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Session collaborator error
    #[error("Session error: {0}")]
    Session(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using OutboxError.
pub type OutboxResult<T> = Result<T, OutboxError>;
