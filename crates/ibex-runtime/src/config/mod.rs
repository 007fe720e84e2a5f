//! Configuration for the Ibex runtime.
//!
//! Configuration is layered with figment (see [`loader`]) and deserialized
//! into [`IbexConfig`]. Keys set at run time by administrators are kept as
//! [`Overrides`] and re-applied on every reload.

pub mod error;
pub mod loader;
pub mod overrides;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile};
pub use overrides::{Overrides, REDACTED, lookup, redact};
pub use schema::{
    DatabaseConfig, DispatcherConfig, IbexConfig, LogFormat, LogLevel, LogOutput, LogRotation,
    LoggingConfig, PluginsConfig, SourceConfig, SpanEventConfig,
};
pub use validation::validate_config;
