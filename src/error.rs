//! Error types for quotesync.
//!
//! This module defines all error types used throughout the library.

use thiserror::Error;

/// Result type alias for quotesync operations
pub type QuoteResult<T> = Result<T, QuoteError>;

/// Main error type for quotesync operations
#[derive(Error, Debug)]
pub enum QuoteError {
    #[error("Validation error in {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("A sync cycle is already in progress")]
    SyncInProgress,

    #[error("{0}")]
    Other(String),
}

impl QuoteError {
    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        QuoteError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new transport error
    pub fn transport(message: impl Into<String>) -> Self {
        QuoteError::Transport(message.into())
    }

    /// True for failures of the remote channel (fetch/post).
    pub fn is_transport(&self) -> bool {
        matches!(self, QuoteError::Transport(_))
    }
}

impl From<reqwest::Error> for QuoteError {
    fn from(err: reqwest::Error) -> Self {
        QuoteError::Transport(err.to_string())
    }
}
