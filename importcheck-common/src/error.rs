//! Common error types for importcheck

use thiserror::Error;

/// Common result type for importcheck operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across importcheck crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data store could not be reached or refused the statement
    #[error("Data store unavailable: {0}")]
    Unavailable(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

}
