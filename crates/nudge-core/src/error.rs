//! Core error types for nudge-core.
//!
//! Nothing in here is fatal to the host: the selector recovers from trigger
//! and persistence failures locally and only logs them. These types surface
//! from the fallible setup paths (loading config, catalogs, stores).

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for nudge-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Dismissal store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Catalog validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// Dismissal store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to read the persisted record
    #[error("Failed to read dismissal record at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write the persisted record
    #[error("Failed to write dismissal record at {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persisted record exists but is not a JSON array of strings
    #[error("Malformed dismissal record: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Store could not be reached (poisoned lock, missing directory, ...)
    #[error("Dismissal store unavailable: {0}")]
    Unavailable(String),
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

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Data directory could not be determined or created
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

/// Catalog validation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Rule id must not be empty (rule #{index})")]
    EmptyId { index: usize },

    #[error("Duplicate rule id '{0}'")]
    DuplicateId(String),

    /// Invalid value
    #[error("Invalid value for '{field}' in rule '{rule}': {message}")]
    InvalidValue {
        rule: String,
        field: String,
        message: String,
    },
}

/// Failure while evaluating a trigger or computing a repeat key.
///
/// The selector treats any of these as "not triggered" for the current tick.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TriggerError {
    #[error("bucket size for '{field}' must be greater than zero")]
    ZeroBucket { field: &'static str },

    #[error("predicate failed: {0}")]
    Predicate(String),

    #[error("predicate panicked: {0}")]
    Panicked(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
