//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Redispatch depth must be between 1 and 10")]
    InvalidRedispatchDepth,

    #[error("Invalid fallback search URL")]
    InvalidSearchUrl,

    #[error("Invalid log filter directive: {0}")]
    InvalidLogFilter(String),

    #[error("File storage requires a data directory")]
    MissingDataDir,
}
