//! Common error types for the CPZ pipeline

use std::path::Path;
use thiserror::Error;

/// Common result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across pipeline stages
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed source or canonical file
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Invalid-input error for a file that could not be read or parsed
    pub fn input(path: &Path, err: impl std::fmt::Display) -> Self {
        Error::InvalidInput(format!("{}: {}", path.display(), err))
    }

    /// True for SQLite lock contention ("database is locked"/"database table is locked")
    pub fn is_lock_contention(&self) -> bool {
        match self {
            Error::Database(db_err) => db_err.to_string().contains("is locked"),
            _ => false,
        }
    }
}
