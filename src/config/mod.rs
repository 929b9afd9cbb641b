//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `DINEBOT` prefix and nested values use double underscores as separators.
//! Every setting has a default, so an empty environment is a valid setup.
//!
//! # Example
//!
//! ```no_run
//! use dinebot::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Closing prompt: {}", config.bot.closing_prompt);
//! ```

mod bot;
mod error;
mod storage;
mod telemetry;

pub use bot::{BotConfig, MAX_REDISPATCH_DEPTH_LIMIT};
pub use error::{ConfigError, ValidationError};
pub use storage::{StorageBackend, StorageConfig};
pub use telemetry::{Environment, TelemetryConfig};

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    /// Dispatcher texts and limits
    #[serde(default)]
    pub bot: BotConfig,

    /// Logging configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// State storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `DINEBOT` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `DINEBOT__BOT__MAX_REDISPATCH_DEPTH=2` -> `bot.max_redispatch_depth = 2`
    /// - `DINEBOT__STORAGE__BACKEND=file` -> `storage.backend = file`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("DINEBOT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Load and validate in one step
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` for semantically invalid values.
    pub fn load_validated() -> Result<Self, ConfigError> {
        let config = Self::load()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.bot.validate()?;
        self.telemetry.validate()?;
        self.storage.validate()?;
        Ok(())
    }
}
