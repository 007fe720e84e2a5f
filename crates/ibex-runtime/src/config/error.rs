//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// The file extension is not a supported format.
    #[error("Unsupported configuration file format: .{0}")]
    UnsupportedFormat(String),

    /// The layered configuration could not be deserialized.
    #[error("Failed to extract configuration: {0}")]
    Extract(String),

    /// A value is present but not acceptable.
    #[error("Invalid configuration: {message}")]
    Validation { message: String },

    /// A dotted key does not name a configuration value.
    #[error("Invalid configuration key: {0}")]
    InvalidKey(String),
}

impl ConfigError {
    /// Creates a validation error with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::Extract(e.to_string())
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
