//! Source adapter interface.
//!
//! A source owns one connection to a chat network. Inbound traffic is turned
//! into [`Event`]s and handed to an [`EventSink`]; once the sink returns the
//! finalized event, the source delivers its responses.
//!
//! ```rust,ignore
//! // inside a source's read loop
//! let event = Event::message(self.name(), text).with_channel(channel);
//! let sink = Arc::clone(&sink);
//! tokio::spawn(async move {
//!     let done = sink.dispatch(event).await;
//!     source.deliver(&done).await;
//! });
//! ```
//!
//! Lifecycle operations (`connect`, `disconnect`, `join`, `part`) are driven by
//! the runtime and by administrative processors, never by the dispatcher.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{SourceError, SourceResult};
use crate::event::{Event, Response};

/// Receives events produced by sources.
///
/// The application context implements this by forwarding to whichever
/// dispatcher is current, so sources keep working across dispatcher reloads.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Dispatches `event` and returns it with its responses attached.
    async fn dispatch(&self, event: Event) -> Event;
}

/// Shared handle to an [`EventSink`].
pub type BoxedSink = Arc<dyn EventSink>;

/// A connection to one chat network.
#[async_trait]
pub trait Source: Send + Sync {
    /// Configured name of this source instance.
    fn name(&self) -> &str;

    /// Whether the connection is currently established.
    fn is_connected(&self) -> bool;

    /// Opens the connection. Events read from it are sent to `sink`.
    async fn connect(&self, sink: BoxedSink) -> SourceResult<()>;

    /// Closes the connection.
    async fn disconnect(&self) -> SourceResult<()>;

    /// Joins a channel.
    async fn join(&self, channel: &str) -> SourceResult<()> {
        let _ = channel;
        Err(SourceError::unsupported(self.name(), "join"))
    }

    /// Leaves a channel.
    async fn part(&self, channel: &str) -> SourceResult<()> {
        let _ = channel;
        Err(SourceError::unsupported(self.name(), "part"))
    }

    /// Delivers one completed response, applying transport limits.
    async fn send(&self, response: &Response) -> SourceResult<()>;

    /// Delivers every response of a finalized event, in order.
    ///
    /// A failed response is logged and does not stop the remaining ones.
    async fn deliver(&self, event: &Event) {
        for response in event.responses() {
            if let Err(e) = self.send(response).await {
                warn!(
                    source = %self.name(),
                    target = ?response.target(),
                    error = %e,
                    "Failed to deliver response"
                );
            }
        }
    }

    /// Asks the network whether `nick` is identified to its services.
    ///
    /// Callers are expected to bound this with a timeout.
    async fn verify_identity(&self, nick: &str) -> SourceResult<bool> {
        let _ = nick;
        Ok(false)
    }
}

/// Shared handle to a [`Source`].
pub type BoxedSource = Arc<dyn Source>;

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Recorder {
        sent: Mutex<Vec<Response>>,
    }

    #[async_trait]
    impl Source for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn is_connected(&self) -> bool {
            true
        }

        async fn connect(&self, _sink: BoxedSink) -> SourceResult<()> {
            Ok(())
        }

        async fn disconnect(&self) -> SourceResult<()> {
            Ok(())
        }

        async fn send(&self, response: &Response) -> SourceResult<()> {
            if response.text == "fail" {
                return Err(SourceError::Protocol("rejected".into()));
            }
            self.sent.lock().unwrap().push(response.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_deliver_continues_after_failure() {
        let source = Recorder {
            sent: Mutex::new(Vec::new()),
        };
        let event = Event::message("recorder", "hi")
            .with_channel("#c")
            .finalize([Response::new("a"), Response::new("fail"), Response::new("b")]);

        source.deliver(&event).await;

        let sent = source.sent.lock().unwrap();
        let texts: Vec<_> = sent.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, ["a", "b"]);
        assert!(sent.iter().all(|r| r.target() == Some("#c")));
    }

    #[tokio::test]
    async fn test_default_lifecycle_operations() {
        let source = Recorder {
            sent: Mutex::new(Vec::new()),
        };
        assert!(matches!(
            source.join("#c").await,
            Err(SourceError::Unsupported { operation: "join", .. })
        ));
        assert!(!source.verify_identity("alice").await.unwrap());
    }
}
