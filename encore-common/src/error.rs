//! Error types shared by the library and the web service

use thiserror::Error;

/// Result alias used throughout the shared library
pub type Result<T> = std::result::Result<T, Error>;

/// Failures the shared library can surface.
///
/// Request-level failures (validation, missing resources) are the web
/// layer's concern and never appear here.
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

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
