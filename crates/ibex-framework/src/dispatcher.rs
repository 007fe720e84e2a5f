//! Event dispatcher.
//!
//! For each event the [`Dispatcher`]:
//!
//! 1. takes a [`Snapshot`](crate::Snapshot) of the registry,
//! 2. walks the processors in dispatch order, skipping those that do not
//!    accept the event (kind or addressing),
//! 3. runs each processor's rule chain with its own [`HandlerContext`],
//! 4. appends every processor's responses to the event, in processor order,
//!    and returns the finalized event.
//!
//! All matching rules run; there is no first-match-wins. A processor's
//! failures are contained to that processor. An event that matches nothing
//! comes back with no responses.
//!
//! ```rust,ignore
//! let dispatcher = Dispatcher::new(Arc::clone(&registry));
//! let done = dispatcher.dispatch(event, Services::new(authorizer)).await;
//! source.deliver(&done).await;
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{Instrument, debug, debug_span};

use ibex_core::Event;

use crate::context::{BaseContext, HandlerContext, Services};
use crate::registry::Registry;

/// Tunables of a [`Dispatcher`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherSettings {
    /// Upper bound for a single handler invocation. `None` waits forever.
    pub handler_timeout: Option<Duration>,
}

/// Matches events against the registry and runs the handlers.
///
/// Cheap to rebuild: it only holds a reference to the registry, so replacing
/// the dispatcher leaves processors and source connections alone.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    settings: DispatcherSettings,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            settings: DispatcherSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: DispatcherSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn settings(&self) -> DispatcherSettings {
        self.settings
    }

    /// Dispatches `event` and returns it with its responses attached.
    pub async fn dispatch(&self, event: Event, services: Services) -> Event {
        let span = debug_span!(
            "dispatch",
            source = %event.source,
            kind = %event.kind,
            sender = %event.sender_id,
            channel = %event.channel,
        );
        self.run(event, services).instrument(span).await
    }

    async fn run(&self, event: Event, services: Services) -> Event {
        let snapshot = self.registry.snapshot();
        let base = Arc::new(BaseContext::new(event, services));
        let mut responses = Vec::new();

        for processor in snapshot.iter() {
            if !processor.accepts(base.event()) {
                continue;
            }
            let ctx = Arc::new(HandlerContext::new(
                Arc::clone(&base),
                processor.shared_name(),
                Arc::clone(processor.options()),
            ));
            processor
                .dispatch_event(Arc::clone(&ctx), self.settings.handler_timeout)
                .await;
            responses.extend(ctx.take_responses());
        }

        debug!(responses = responses.len(), "Dispatch finished");
        base.into_event().finalize(responses)
    }
}
