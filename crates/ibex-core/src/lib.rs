//! # Ibex Core
//!
//! The shared vocabulary of the Ibex chat engine:
//!
//! - [`Event`] and [`Response`]: the normalized inbound record and its replies
//! - [`Source`]: the contract every transport implements
//! - [`EventSink`]: where sources hand their events
//!
//! Nothing in this crate knows about processors or dispatch policy; see
//! `ibex-framework` for those.

pub mod error;
pub mod event;
pub mod source;

pub use error::{SourceError, SourceResult};
pub use event::{Event, EventKind, Response};
pub use source::{BoxedSink, BoxedSource, EventSink, Source};
