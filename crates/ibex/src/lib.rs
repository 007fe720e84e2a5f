//! # Ibex
//!
//! A chat bot engine that receives messages from several networks, runs them
//! through independently loadable processors, and sends the replies back,
//! all without restarting when processors or configuration change.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐ Event ┌─────────────┐     ┌─────────────────────────────────┐
//! │ Source     │──────▶│ Ibex (sink) │────▶│ Dispatcher                      │
//! │ (IRC, ...) │       └─────────────┘     │  processor "admin"  rules ───▶  │
//! │            │◀──────── responses ───────│  processor "crypto" rules ───▶  │
//! └────────────┘                           └─────────────────────────────────┘
//! ```
//!
//! - **Sources**: network adapters, see [`ibex_adapter_irc`]
//! - **Processors**: named bundles of pattern rules with setup and teardown
//! - **Dispatcher**: runs every matching rule of every processor, isolating failures
//! - **Reloader**: swaps processors, dispatcher, authorization and databases live
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ibex::prelude::*;
//!
//! async fn ping(ctx: Arc<HandlerContext>, _: Captures) {
//!     ctx.add_response("pong");
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let ibex = Ibex::builder()
//!         .processors(ibex::plugins::catalog())
//!         .processor("ping", || {
//!             Processor::builder("ping")
//!                 .rule(on_pattern("^ping$").handler(ping))
//!                 .build()
//!         })
//!         .source_kind("irc", IrcSource::from_settings)
//!         .build()?;
//!     ibex.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `json-log`: JSON log output

pub use ibex_adapter_irc as irc;
pub use ibex_core as core;
pub use ibex_framework as framework;
pub use ibex_plugins as plugins;
pub use ibex_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use ibex::prelude::*;
/// ```
pub mod prelude {
    pub use ibex_framework::prelude::*;

    pub use ibex_adapter_irc::IrcSource;
    pub use ibex_core::{BoxedSource, EventSink, Source, SourceError, SourceResult};
    pub use ibex_framework::{Control, ProcessorCatalog};
    pub use ibex_runtime::{ConfigLoader, Ibex, IbexBuilder};
}
