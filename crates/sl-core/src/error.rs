//! Error types for sl-core

use thiserror::Error;

/// Core error type for sqlledger
#[derive(Error, Debug)]
pub enum CoreError {
    /// C001: Configuration file not found
    #[error("[C001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// C002: Failed to parse configuration file
    #[error("[C002] Failed to parse config: {message}")]
    ConfigParseError { message: String },

    /// C003: Invalid configuration value
    #[error("[C003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// C004: Schema key unusable as a ledger table identifier
    #[error("[C004] Invalid schema key '{key}': {reason}")]
    InvalidSchemaKey { key: String, reason: String },

    /// C005: Script catalog could not be enumerated
    #[error("[C005] Failed to read script catalog '{path}': {source}")]
    CatalogIo {
        path: String,
        source: std::io::Error,
    },
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;

impl From<serde_yaml::Error> for CoreError {
    fn from(err: serde_yaml::Error) -> Self {
        CoreError::ConfigParseError {
            message: err.to_string(),
        }
    }
}
