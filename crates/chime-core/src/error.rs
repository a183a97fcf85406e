//! Core error types for chime-core.
//!
//! This module defines the error hierarchy using thiserror. Store and
//! scheduler failures are fatal to the operation that hit them; native
//! bridge failures never surface here -- they are caught and logged at the
//! call site and reconciliation continues on local state.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for chime-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Record store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Platform alarm scheduler errors
    #[error("Alarm scheduler error: {0}")]
    Alarm(#[from] AlarmError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Record-store errors. Any of these aborts the surrounding operation;
/// the previously persisted state is left intact (every persist is a
/// single whole-record replace).
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the backing database
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Record payload could not be (de)serialized
    #[error("Record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Store is locked by another writer
    #[error("Store is locked")]
    Locked,
}

/// Platform alarm scheduler errors.
#[derive(Error, Debug)]
pub enum AlarmError {
    /// The scheduler backend rejected the operation
    #[error("Scheduler backend failed: {0}")]
    Backend(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// A required field is missing for the chosen repeat policy
    #[error("Missing field '{field}' required by repeat type '{repeat}'")]
    MissingField { field: String, repeat: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
