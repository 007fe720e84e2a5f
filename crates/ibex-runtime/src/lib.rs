//! # Ibex Runtime
//!
//! Turns the framework pieces into a running engine:
//!
//! - [`Ibex`]: the application context; sources deliver events to it and
//!   administrative handlers control it
//! - [`Reloader`]: rebuilds dispatcher, databases, authorization,
//!   processors and sources without dropping connections
//! - [`config`]: figment-layered configuration with run-time overrides
//! - [`logging`]: `tracing-subscriber` setup
//! - [`databases`]: named SQLite pools
//! - [`sources`]: source kinds and the live source table

pub mod config;
pub mod databases;
pub mod error;
pub mod logging;
pub mod reloader;
pub mod runtime;
pub mod sources;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConfigError, ConfigLoader, ConfigResult, IbexConfig, Overrides};
pub use databases::{DatabaseError, DatabaseResult, Databases};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use reloader::{LoadReport, Reloader};
pub use runtime::{Ibex, IbexBuilder};
pub use sources::{SourceCatalog, SourceFactory, SourceRegistry};

pub use tracing;
