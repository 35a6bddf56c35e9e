//! # Bus Events
//!
//! Event kinds carried by the shared bus and the topic taxonomy used to
//! filter them. Each event kind travels on its own typed channel; topics
//! only subdivide the response channel by domain.

use serde::{Deserialize, Serialize};
use shared_types::envelope::{ErrorEnvelope, ResponseEnvelope};
use shared_types::ipc::ResponsePayload;

/// Connection lifecycle events pushed by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionEvent {
    /// A connect attempt started.
    Connecting,
    /// The socket is open; authentication not yet complete.
    SocketOpen,
    /// The session is authenticated and ready for chat traffic.
    Authenticated,
    /// The socket closed.
    Closed {
        /// Optional close reason from the transport.
        reason: Option<String>,
    },
}

/// Topic used to route and filter events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Channel history pages.
    History,
    /// Reaction counts.
    Reactions,
    /// Pin and unpin confirmations.
    Pins,
    /// Domain errors (shared error channel).
    Errors,
    /// Connection lifecycle.
    Lifecycle,
    /// All events (no filtering).
    All,
}

impl EventTopic {
    /// Topic of a response payload.
    #[must_use]
    pub fn for_payload(payload: &ResponsePayload) -> Self {
        match payload {
            ResponsePayload::History { .. } => EventTopic::History,
            ResponsePayload::ReactionCounts { .. } => EventTopic::Reactions,
            ResponsePayload::Pinned(_) | ResponsePayload::Unpinned { .. } => EventTopic::Pins,
        }
    }
}

/// Anything that can be routed by topic.
pub trait Topical {
    /// The topic this event belongs to.
    fn topic(&self) -> EventTopic;
}

impl Topical for ResponseEnvelope {
    fn topic(&self) -> EventTopic {
        EventTopic::for_payload(&self.payload)
    }
}

impl Topical for ErrorEnvelope {
    fn topic(&self) -> EventTopic {
        EventTopic::Errors
    }
}

impl Topical for ConnectionEvent {
    fn topic(&self) -> EventTopic {
        EventTopic::Lifecycle
    }
}

/// Filter for subscribing to specific topics.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self { topics }
    }

    /// Create a filter for a single topic.
    #[must_use]
    pub fn topic(topic: EventTopic) -> Self {
        Self {
            topics: vec![topic],
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches<T: Topical>(&self, event: &T) -> bool {
        self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic())
    }
}
