//! Contexts handed to handlers.
//!
//! Two layers model how one event travels through many processors:
//!
//! - [`BaseContext`] is **shared** by every processor for one dispatch. It
//!   owns the event and the [`Services`] captured when the dispatch started.
//! - [`HandlerContext`] is **per processor**. It adds the processor's resolved
//!   options and a private response buffer, so concurrently suspended
//!   handlers of different processors never interleave their replies.

use std::sync::Arc;

use parking_lot::Mutex;

use ibex_core::{Event, Response};

use crate::auth::{Authorizer, DenyAll};
use crate::control::Control;
use crate::options::Options;

// =============================================================================
// Services
// =============================================================================

/// Collaborators a dispatch may use, captured once when the dispatch starts.
///
/// Replacing the authorizer or the control handle on the application context
/// affects the next dispatch, never one already running.
#[derive(Clone)]
pub struct Services {
    authorizer: Arc<dyn Authorizer>,
    control: Option<Arc<dyn Control>>,
}

impl Services {
    pub fn new(authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            authorizer,
            control: None,
        }
    }

    /// Attaches the administrative control handle.
    pub fn with_control(mut self, control: Arc<dyn Control>) -> Self {
        self.control = Some(control);
        self
    }

    pub fn authorizer(&self) -> &Arc<dyn Authorizer> {
        &self.authorizer
    }

    pub fn control(&self) -> Option<&Arc<dyn Control>> {
        self.control.as_ref()
    }
}

impl Default for Services {
    fn default() -> Self {
        Self::new(Arc::new(DenyAll))
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("control", &self.control.is_some())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// BaseContext
// =============================================================================

/// The shared context for one dispatch.
#[derive(Debug)]
pub struct BaseContext {
    event: Event,
    services: Services,
}

impl BaseContext {
    pub(crate) fn new(event: Event, services: Services) -> Self {
        Self { event, services }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Recovers the event once every handler has finished.
    ///
    /// A handler that smuggled its context into a detached task keeps the base
    /// alive; the event is cloned in that case.
    pub(crate) fn into_event(self: Arc<Self>) -> Event {
        match Arc::try_unwrap(self) {
            Ok(base) => base.event,
            Err(shared) => shared.event.clone(),
        }
    }
}

// =============================================================================
// HandlerContext
// =============================================================================

/// The context passed to handlers.
///
/// ```rust,ignore
/// async fn greet(ctx: Arc<HandlerContext>, args: Captures) {
///     let greeting = ctx.options().get_str("greeting").unwrap_or("hello");
///     ctx.add_response(format!("{greeting}, {}", ctx.event().sender_id));
/// }
/// ```
#[derive(Debug)]
pub struct HandlerContext {
    base: Arc<BaseContext>,
    processor: Arc<str>,
    options: Arc<Options>,
    responses: Mutex<Vec<Response>>,
}

impl HandlerContext {
    pub(crate) fn new(base: Arc<BaseContext>, processor: Arc<str>, options: Arc<Options>) -> Self {
        Self {
            base,
            processor,
            options,
            responses: Mutex::new(Vec::new()),
        }
    }

    /// The event being dispatched.
    pub fn event(&self) -> &Event {
        self.base.event()
    }

    /// Name of the processor this context belongs to.
    pub fn processor(&self) -> &str {
        &self.processor
    }

    /// Options resolved when the processor was loaded.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Appends a response. Target and source default to the event's.
    pub fn add_response(&self, response: impl Into<Response>) {
        self.responses.lock().push(response.into());
    }

    /// Administrative control, when the dispatch was started by a runtime.
    pub fn control(&self) -> Option<&Arc<dyn Control>> {
        self.base.services().control()
    }

    /// Checks whether the event's sender holds `permission`.
    pub async fn authorise(&self, permission: &str) -> bool {
        self.base
            .services()
            .authorizer()
            .authorise(self.event(), permission)
            .await
    }

    pub(crate) fn take_responses(&self) -> Vec<Response> {
        std::mem::take(&mut *self.responses.lock())
    }
}
