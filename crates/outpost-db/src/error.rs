//! Error types for the storage layer.
//!
//! All errors are propagated via [`DbError`], which wraps the underlying
//! [`fred`] and [`serde_json`] errors. At the planner's trait boundary they
//! are converted into [`QueryError`] and [`JournalError`].

use outpost_core::error::{JournalError, QueryError};

/// Errors that can occur in the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `Dragonfly`/Redis operation failed.
    #[error("Dragonfly error: {0}")]
    Dragonfly(#[from] fred::error::Error),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<DbError> for QueryError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Serialization(e) => Self::Decode(e.to_string()),
            other => Self::Transport(other.to_string()),
        }
    }
}

impl From<DbError> for JournalError {
    fn from(err: DbError) -> Self {
        Self(err.to_string())
    }
}
