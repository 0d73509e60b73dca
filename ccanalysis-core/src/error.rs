//! Error types for ccanalysis-core

use thiserror::Error;

/// Main error type for the ccanalysis-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Logging setup error
    #[error("logging error: {0}")]
    Logging(String),

    /// Hook payload was well-formed JSON but unusable
    #[error("invalid hook payload: {0}")]
    Payload(String),
}

/// Result type alias for ccanalysis-core
pub type Result<T> = std::result::Result<T, Error>;
