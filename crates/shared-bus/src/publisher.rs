//! # Event Publisher
//!
//! Defines the publishing side of the event bus and the in-memory bus
//! itself. Each event kind has its own typed broadcast channel; no runtime
//! type filtering happens anywhere.

use crate::events::{ConnectionEvent, EventFilter, EventTopic, Topical};
use crate::subscriber::{EventStream, Subscription, SubscriptionCounts, SubscriptionTicket};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use shared_types::envelope::{ErrorEnvelope, ResponseEnvelope};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Trait for publishing events to the bus.
///
/// Only the transport layer publishes; the correlation layer subscribes.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a success envelope. Returns the number of receivers.
    async fn publish_response(&self, envelope: ResponseEnvelope) -> usize;

    /// Publish an error envelope on the shared error channel.
    async fn publish_error(&self, envelope: ErrorEnvelope) -> usize;

    /// Publish a connection lifecycle event.
    async fn publish_lifecycle(&self, event: ConnectionEvent) -> usize;

    /// Get the total number of events published.
    fn events_published(&self) -> u64;
}

/// In-memory implementation of the event bus.
///
/// Uses one `tokio::sync::broadcast` channel per event kind. Cloning the
/// bus shares the underlying channels.
#[derive(Clone)]
pub struct InMemoryEventBus {
    /// Success envelopes.
    responses: broadcast::Sender<ResponseEnvelope>,

    /// Error envelopes.
    errors: broadcast::Sender<ErrorEnvelope>,

    /// Lifecycle events.
    lifecycle: broadcast::Sender<ConnectionEvent>,

    /// Active subscription count by topic.
    subscriptions: SubscriptionCounts,

    /// Total events published.
    events_published: Arc<AtomicU64>,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryEventBus {
    /// Create a new in-memory event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory event bus with specified capacity.
    ///
    /// The capacity determines how many events each channel buffers before
    /// slow receivers start lagging.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (responses, _) = broadcast::channel(capacity);
        let (errors, _) = broadcast::channel(capacity);
        let (lifecycle, _) = broadcast::channel(capacity);
        Self {
            responses,
            errors,
            lifecycle,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            events_published: Arc::new(AtomicU64::new(0)),
            capacity,
        }
    }

    /// Subscribe to success envelopes matching a filter.
    #[must_use]
    pub fn subscribe_responses(&self, filter: EventFilter) -> Subscription<ResponseEnvelope> {
        let tracked = if filter.topics.is_empty() {
            vec![EventTopic::All]
        } else {
            filter.topics.clone()
        };
        debug!(topics = ?filter.topics, "New response subscription created");
        Subscription::new(
            self.responses.subscribe(),
            filter,
            SubscriptionTicket::new(self.subscriptions.clone(), tracked),
        )
    }

    /// Subscribe to the shared error channel.
    #[must_use]
    pub fn subscribe_errors(&self) -> Subscription<ErrorEnvelope> {
        Subscription::new(
            self.errors.subscribe(),
            EventFilter::all(),
            SubscriptionTicket::new(self.subscriptions.clone(), vec![EventTopic::Errors]),
        )
    }

    /// Subscribe to connection lifecycle events.
    #[must_use]
    pub fn subscribe_lifecycle(&self) -> Subscription<ConnectionEvent> {
        Subscription::new(
            self.lifecycle.subscribe(),
            EventFilter::all(),
            SubscriptionTicket::new(self.subscriptions.clone(), vec![EventTopic::Lifecycle]),
        )
    }

    /// Stream of success envelopes matching a filter.
    #[must_use]
    pub fn response_stream(&self, filter: EventFilter) -> EventStream<ResponseEnvelope> {
        EventStream::new(self.subscribe_responses(filter))
    }

    /// Stream of error envelopes.
    #[must_use]
    pub fn error_stream(&self) -> EventStream<ErrorEnvelope> {
        EventStream::new(self.subscribe_errors())
    }

    /// Get the number of active receivers across all channels.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.responses.receiver_count()
            + self.errors.receiver_count()
            + self.lifecycle.receiver_count()
    }

    /// Get the number of live subscriptions counted under a topic.
    #[must_use]
    pub fn subscription_count(&self, topic: EventTopic) -> usize {
        self.subscriptions
            .read()
            .map(|map| map.get(&topic).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn send_on<T: Topical + Clone>(&self, sender: &broadcast::Sender<T>, event: T) -> usize {
        let topic = event.topic();
        self.events_published.fetch_add(1, Ordering::Relaxed);

        match sender.send(event) {
            Ok(receiver_count) => {
                debug!(
                    topic = ?topic,
                    receivers = receiver_count,
                    "Event published"
                );
                receiver_count
            }
            Err(e) => {
                warn!(
                    topic = ?topic,
                    error = %e,
                    "Event dropped (no receivers)"
                );
                0
            }
        }
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEventBus")
            .field("subscriber_count", &self.subscriber_count())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish_response(&self, envelope: ResponseEnvelope) -> usize {
        self.send_on(&self.responses, envelope)
    }

    async fn publish_error(&self, envelope: ErrorEnvelope) -> usize {
        self.send_on(&self.errors, envelope)
    }

    async fn publish_lifecycle(&self, event: ConnectionEvent) -> usize {
        self.send_on(&self.lifecycle, event)
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}
