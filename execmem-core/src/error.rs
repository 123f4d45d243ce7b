//! Error types for execmem-core

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the execmem-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error (the store failed mid-operation)
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The store could not be opened at all
    #[error("storage unavailable at {path}: {message}")]
    StorageUnavailable { path: PathBuf, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Execution not found
    #[error("execution not found: {0}")]
    RecordNotFound(i64),

    /// A stored metric value could not be decoded
    #[error("malformed metric '{key}': {message}")]
    MalformedMetric { key: String, message: String },

    /// Rejected relevance weight update
    #[error("invalid weight: {0}")]
    InvalidWeight(String),

    /// Rejected execution record
    #[error("invalid execution record: {0}")]
    InvalidRecord(String),
}

/// Result type alias for execmem-core
pub type Result<T> = std::result::Result<T, Error>;
