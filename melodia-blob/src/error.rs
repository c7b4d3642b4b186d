use std::time::Duration;

use thiserror::Error;

/// Result type for blob operations
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur during blob operations
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Blob not found: {key}")]
    NotFound { key: String },

    #[error("Blob already exists: {key}")]
    AlreadyExists { key: String },

    #[error("Invalid content: {reason}")]
    InvalidContent { reason: String },

    #[error("Invalid request: {message}")]
    Invalid { message: String },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Signing worker failed: {reason}")]
    Worker { reason: String },

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl BlobError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create an invalid request error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(key: S) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create an already exists error
    pub fn already_exists<S: Into<String>>(key: S) -> Self {
        Self::AlreadyExists { key: key.into() }
    }

    /// Create an invalid content error
    pub fn invalid_content<S: Into<String>>(reason: S) -> Self {
        Self::InvalidContent {
            reason: reason.into(),
        }
    }

    pub fn worker<S: Into<String>>(reason: S) -> Self {
        Self::Worker {
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}
