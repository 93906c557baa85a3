//! Application configuration module
//!
//! Type-safe configuration loading from environment variables using the
//! `config` and `dotenvy` crates. Configuration is loaded with the
//! `ROOMCAST` prefix and nested values use double underscores as
//! separators.
//!
//! # Example
//!
//! ```no_run
//! use roomcast::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! if config.adapter.is_some() {
//!     println!("Running clustered");
//! }
//! ```

mod adapter;
mod error;

pub use adapter::AdapterConfig;
pub use error::{ConfigError, ValidationError};

use serde::Deserialize;

/// Root application configuration.
///
/// The adapter section is optional: when absent, every namespace gets the
/// local-only broadcast implementation and no bus connection is opened.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Cluster adapter configuration (message bus endpoint, channel
    /// prefix, query deadline).
    #[serde(default)]
    pub adapter: Option<AdapterConfig>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// This function:
    /// 1. Loads `.env` if present (for development)
    /// 2. Reads environment variables with the `ROOMCAST` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `ROOMCAST__ADAPTER__HOST=redis.internal` -> `adapter.host`
    /// - `ROOMCAST__ADAPTER__PREFIX=chat` -> `adapter.prefix`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into the expected
    /// types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("ROOMCAST")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(adapter) = &self.adapter {
            adapter.validate()?;
        }
        Ok(())
    }
}
