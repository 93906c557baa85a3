//! Configuration error types

use thiserror::Error;

/// Errors that occur while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying loader error (missing variables, type mismatches).
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),
}

/// Errors that occur during semantic validation of configuration values.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(&'static str),

    #[error("Unsupported bus network '{0}' (expected 'tcp' or 'unix')")]
    UnsupportedNetwork(String),

    #[error("Channel prefix must not be empty")]
    EmptyPrefix,

    #[error("Channel prefix must not contain '#': {0}")]
    PrefixContainsSeparator(String),
}
