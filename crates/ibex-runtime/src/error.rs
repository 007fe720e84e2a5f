//! Runtime error types.

use ibex_core::SourceError;
use ibex_framework::{AuthError, ControlError, RegistryError};
use thiserror::Error;

use crate::config::ConfigError;
use crate::databases::DatabaseError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("unknown source '{0}'")]
    UnknownSource(String),

    #[error("source '{name}' has unknown type '{kind}'")]
    UnknownSourceKind { name: String, kind: String },

    /// The application context has been dropped.
    #[error("runtime is shutting down")]
    Stopped,
}

impl RuntimeError {
    /// Converts into the error reported through the control surface.
    pub fn into_control(self, operation: &'static str) -> ControlError {
        match self {
            Self::Registry(e) => ControlError::Registry(e),
            Self::Source(e) => ControlError::Source(e),
            Self::UnknownSource(name) => ControlError::UnknownSource(name),
            other => ControlError::failed(operation, other),
        }
    }
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
