//! Administrative control surface.
//!
//! Handlers reach the running application through [`Control`], obtained from
//! [`HandlerContext::control`](crate::HandlerContext::control). The runtime
//! implements it; the framework only defines the seam, so administrative
//! processors never depend on the runtime crate.
//!
//! Every operation is safe to call from inside a handler: none of them waits
//! on anything a dispatch holds.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use ibex_core::{BoxedSource, SourceError};

use crate::error::RegistryError;

/// Description of a loaded processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorInfo {
    pub name: String,
    pub feature: Option<String>,
    pub usage: Option<String>,
}

/// Errors reported by [`Control`] operations.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("unknown source '{0}'")]
    UnknownSource(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("{operation} failed: {reason}")]
    Failed {
        operation: &'static str,
        reason: String,
    },
}

impl ControlError {
    pub fn failed(operation: &'static str, reason: impl ToString) -> Self {
        Self::Failed {
            operation,
            reason: reason.to_string(),
        }
    }
}

/// Result type for control operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Runtime operations available to administrative processors.
#[async_trait]
pub trait Control: Send + Sync {
    /// Loaded processors in registration order.
    fn processors(&self) -> Vec<ProcessorInfo>;

    async fn load_processor(&self, name: &str) -> ControlResult<()>;
    async fn unload_processor(&self, name: &str) -> ControlResult<()>;
    async fn reload_processor(&self, name: &str) -> ControlResult<()>;

    async fn reload_dispatcher(&self) -> ControlResult<()>;
    async fn reload_reloader(&self) -> ControlResult<()>;
    async fn reload_auth(&self) -> ControlResult<()>;
    async fn reload_databases(&self) -> ControlResult<()>;

    /// Re-reads the configuration from its sources.
    async fn reload_config(&self) -> ControlResult<()>;

    /// Looks up a dotted configuration key, e.g. `dispatcher.handler_timeout_secs`.
    fn config_value(&self, key: &str) -> Option<Value>;

    /// Overrides a dotted configuration key in memory.
    async fn set_config_value(&self, key: &str, value: Value) -> ControlResult<()>;

    fn source(&self, name: &str) -> Option<BoxedSource>;
    fn source_names(&self) -> Vec<String>;
    async fn connect_source(&self, name: &str) -> ControlResult<()>;
    async fn disconnect_source(&self, name: &str) -> ControlResult<()>;
}
