//! Error types shared by source adapters.

use thiserror::Error;

/// Errors raised by [`Source`](crate::Source) implementations.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The operation needs a live connection.
    #[error("source '{source_name}' is not connected")]
    NotConnected {
        /// Name of the source.
        source_name: String,
    },

    /// `connect` was called on a source that is already connected.
    #[error("source '{source_name}' is already connected")]
    AlreadyConnected {
        /// Name of the source.
        source_name: String,
    },

    /// The transport has no notion of the requested operation.
    #[error("source '{source_name}' does not support {operation}")]
    Unsupported {
        /// Name of the source.
        source_name: String,
        /// The operation that was requested.
        operation: &'static str,
    },

    /// Establishing the connection failed.
    #[error("connection to {address} failed: {reason}")]
    Connection {
        /// Remote address.
        address: String,
        /// Reason for failure.
        reason: String,
    },

    /// The peer sent something the adapter could not understand.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The source configuration is unusable.
    #[error("invalid source configuration: {0}")]
    InvalidConfig(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl SourceError {
    /// Creates a not-connected error.
    pub fn not_connected(source_name: impl Into<String>) -> Self {
        Self::NotConnected {
            source_name: source_name.into(),
        }
    }

    /// Creates an unsupported-operation error.
    pub fn unsupported(source_name: impl Into<String>, operation: &'static str) -> Self {
        Self::Unsupported {
            source_name: source_name.into(),
            operation,
        }
    }

    /// Creates a connection error.
    pub fn connection(address: impl Into<String>, reason: impl ToString) -> Self {
        Self::Connection {
            address: address.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;
