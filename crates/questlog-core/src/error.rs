//! Error types for questlog-core

use thiserror::Error;

use crate::sync::RemoteError;

/// Result type alias using questlog-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in questlog-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote backend error
    #[error(transparent)]
    Remote(#[from] RemoteError),
}
