//! # Ibex Framework
//!
//! Everything between a normalized [`Event`](ibex_core::Event) and the
//! handlers that answer it:
//!
//! - [`rule`]: patterns and permissions, compiled into tower service stacks
//! - [`handler`]: the handler trait and [`Flow`] control
//! - [`processor`]: named bundles of rules with options and lifecycle hooks
//! - [`registry`]: the loaded set with snapshot isolation, and the catalog
//!   processors are created from
//! - [`dispatcher`]: fan-out of one event to every matching rule
//! - [`auth`]: permission checks
//! - [`control`]: the administrative seam implemented by the runtime
//!
//! ```rust,ignore
//! use ibex_framework::prelude::*;
//!
//! async fn ping(ctx: Arc<HandlerContext>, _: Captures) {
//!     ctx.add_response("pong");
//! }
//!
//! let processor = Processor::builder("ping")
//!     .rule(on_pattern(r"^ping$").handler(ping))
//!     .build()?;
//! registry.load(processor, &serde_json::Value::Null).await?;
//! ```

pub mod auth;
pub mod context;
pub mod control;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod options;
pub mod processor;
pub mod registry;
pub mod rule;

pub use auth::{
    ADMIN_PERMISSION, AccountPolicy, AllowAll, Auth, AuthPolicy, Authorizer, Credential, DenyAll,
    SourceDirectory,
};
pub use context::{BaseContext, HandlerContext, Services};
pub use control::{Control, ControlError, ControlResult, ProcessorInfo};
pub use dispatcher::{Dispatcher, DispatcherSettings};
pub use error::{
    AuthError, AuthResult, Denied, EventSkipped, RegistryError, RegistryResult, RuleError,
    RuleResult, SetupError,
};
pub use handler::{Flow, Handler, HandlerResponse, HandlerService};
pub use options::{OptionSpec, Options};
pub use processor::{Processor, ProcessorBuilder, SetupContext};
pub use registry::{ProcessorCatalog, ProcessorFactory, Registry, Snapshot};
pub use rule::{Captures, Pattern, Rule, RuleBuilder, on_any, on_pattern};

/// Common imports for processor authors.
pub mod prelude {
    pub use std::sync::Arc;

    pub use ibex_core::{Event, EventKind, Response};

    pub use crate::context::HandlerContext;
    pub use crate::error::RuleResult;
    pub use crate::handler::Flow;
    pub use crate::processor::{Processor, SetupContext};
    pub use crate::rule::{Captures, on_any, on_pattern};
}
