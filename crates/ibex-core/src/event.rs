//! The normalized event model.
//!
//! Every transport translates its raw occurrences (a line from an IRC server, a
//! JSON record from a streaming API) into an [`Event`]. The event is handed to
//! the dispatcher, which collects the [`Response`]s produced by processors and
//! returns the finalized event to the source for delivery.
//!
//! ```text
//! Source ──▶ Event ──▶ Dispatcher ──▶ processors ──▶ Event::finalize ──▶ Source::deliver
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// EventKind
// =============================================================================

/// The kind of occurrence an [`Event`] describes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum EventKind {
    /// A regular chat message.
    Message,
    /// A notice; transports usually forbid automatic replies to these.
    Notice,
    /// A membership or presence change (joined, parted, kicked, ...).
    State,
    /// Anything a transport wants to surface that has no dedicated kind.
    Custom(String),
}

impl EventKind {
    /// Returns the lowercase name of the kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Message => "message",
            Self::Notice => "notice",
            Self::State => "state",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "message" => Self::Message,
            "notice" => Self::Notice,
            "state" => Self::State,
            other => Self::Custom(other.to_string()),
        })
    }
}

impl From<String> for EventKind {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

// =============================================================================
// Response
// =============================================================================

/// An outbound reply produced while dispatching an [`Event`].
///
/// `target` and `source` may be left unset when the response is created; they
/// are filled from the parent event when the dispatcher collects the response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Text to deliver.
    pub text: String,
    /// Channel or user to deliver to. Defaults to the event's channel.
    pub target: Option<String>,
    /// Name of the source to deliver through. Defaults to the event's source.
    pub source: Option<String>,
    /// Narrated action (`/me`) rather than a plain message.
    pub action: bool,
}

impl Response {
    /// Creates a plain response with no explicit target or source.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            target: None,
            source: None,
            action: false,
        }
    }

    /// Sets the delivery target.
    pub fn to(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Sets the source the response is delivered through.
    pub fn via(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Marks the response as a narrated action.
    pub fn as_action(mut self) -> Self {
        self.action = true;
        self
    }

    /// Returns the delivery target, if resolved.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Returns the delivery source, if resolved.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Fills unset delivery fields from `event`.
    fn complete(&mut self, event: &Event) {
        if self.target.is_none() {
            self.target = Some(event.channel.clone());
        }
        if self.source.is_none() {
            self.source = Some(event.source.clone());
        }
    }
}

impl From<String> for Response {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<&str> for Response {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

// =============================================================================
// Event
// =============================================================================

/// One inbound occurrence from a chat source.
///
/// Fields are public for reading and for construction by sources. The
/// response list is private: it is only written once, by [`Event::finalize`],
/// at the end of a dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Name of the source instance that produced the event.
    pub source: String,
    /// Kind of occurrence.
    pub kind: EventKind,
    /// Raw sender identity (for IRC, `nick!user@host`).
    pub sender: String,
    /// Normalized short identity (for IRC, the nick).
    pub sender_id: String,
    /// Account already established by the transport, if any.
    pub account: Option<String>,
    /// Room or conversation the event happened in.
    pub channel: String,
    /// Whether the event was broadcast to a room rather than sent directly.
    pub public: bool,
    /// Whether the bot was addressed by name.
    pub addressed: bool,
    /// Text payload.
    pub message: Option<String>,
    /// State name for [`EventKind::State`] events (`joined`, `kicked`, ...).
    pub state: Option<String>,
    /// Who performed a kick.
    pub kicker: Option<String>,
    /// Transport specific fields.
    pub extra: HashMap<String, Value>,
    responses: Vec<Response>,
}

impl Event {
    /// Creates an event of `kind` from `source` with every other field empty.
    pub fn new(source: impl Into<String>, kind: EventKind) -> Self {
        Self {
            source: source.into(),
            kind,
            sender: String::new(),
            sender_id: String::new(),
            account: None,
            channel: String::new(),
            public: false,
            addressed: false,
            message: None,
            state: None,
            kicker: None,
            extra: HashMap::new(),
            responses: Vec::new(),
        }
    }

    /// Shorthand for a [`EventKind::Message`] event carrying `text`.
    pub fn message(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(source, EventKind::Message).with_message(text)
    }

    pub fn with_sender(mut self, sender: impl Into<String>, sender_id: impl Into<String>) -> Self {
        self.sender = sender.into();
        self.sender_id = sender_id.into();
        self
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_message(mut self, text: impl Into<String>) -> Self {
        self.message = Some(text.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_kicker(mut self, kicker: impl Into<String>) -> Self {
        self.kicker = Some(kicker.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    pub fn addressed(mut self, addressed: bool) -> Self {
        self.addressed = addressed;
        self
    }

    /// Returns the message text, or an empty string for events without one.
    pub fn text(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }

    /// Responses attached by the last dispatch, in collection order.
    pub fn responses(&self) -> &[Response] {
        &self.responses
    }

    /// Consumes the event and returns its responses.
    pub fn into_responses(self) -> Vec<Response> {
        self.responses
    }

    /// Completes `responses` against this event and appends them.
    ///
    /// Called by the dispatcher once every handler has finished; sources only
    /// ever see events that went through this.
    pub fn finalize(mut self, responses: impl IntoIterator<Item = Response>) -> Self {
        for mut response in responses {
            response.complete(&self);
            self.responses.push(response);
        }
        self
    }
}
