//! # Event Subscriber
//!
//! Defines the subscription side of the event bus.

use crate::events::{EventFilter, EventTopic, Topical};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::{debug, warn};

/// Shared per-topic subscription counters.
pub(crate) type SubscriptionCounts = Arc<RwLock<HashMap<EventTopic, usize>>>;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The event bus was closed.
    #[error("Event bus closed")]
    Closed,
}

/// Counts one subscription under its topics for as long as it lives.
pub(crate) struct SubscriptionTicket {
    counts: SubscriptionCounts,
    tracked: Vec<EventTopic>,
}

impl SubscriptionTicket {
    pub(crate) fn new(counts: SubscriptionCounts, tracked: Vec<EventTopic>) -> Self {
        if let Ok(mut map) = counts.write() {
            for topic in &tracked {
                *map.entry(*topic).or_insert(0) += 1;
            }
        }
        Self { counts, tracked }
    }
}

impl Drop for SubscriptionTicket {
    fn drop(&mut self) {
        let Ok(mut map) = self.counts.write() else {
            return;
        };
        for topic in &self.tracked {
            if let Some(count) = map.get_mut(topic) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    map.remove(topic);
                }
            }
        }
        debug!(topics = ?self.tracked, "Subscription dropped");
    }
}

/// A subscription handle on one typed channel.
///
/// Dropping the handle unsubscribes: the receiver is released and the
/// per-topic counters are decremented.
pub struct Subscription<T: Clone> {
    /// The broadcast receiver.
    receiver: broadcast::Receiver<T>,

    /// Filter for this subscription.
    filter: EventFilter,

    /// Subscription tracking (for cleanup).
    ticket: SubscriptionTicket,

    /// Events lost because this subscriber fell behind.
    dropped: u64,
}

impl<T: Clone + Topical> Subscription<T> {
    /// Create a new subscription.
    pub(crate) fn new(
        receiver: broadcast::Receiver<T>,
        filter: EventFilter,
        ticket: SubscriptionTicket,
    ) -> Self {
        Self {
            receiver,
            filter,
            ticket,
            dropped: 0,
        }
    }

    fn note_lag(&mut self, count: u64) {
        self.dropped += count;
        warn!(
            topics = ?self.ticket.tracked,
            lagged = count,
            total_dropped = self.dropped,
            "Subscriber lagged, events dropped"
        );
    }

    /// Receive the next event that matches the filter.
    ///
    /// # Returns
    ///
    /// - `Some(event)` - The next matching event
    /// - `None` - The channel was closed (bus dropped)
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            let event = match self.receiver.recv().await {
                Ok(e) => e,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    self.note_lag(count);
                    continue;
                }
            };

            if self.filter.matches(&event) {
                return Some(event);
            }
        }
    }

    /// Try to receive the next event without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(event))` - An event was available and matched
    /// - `Ok(None)` - No event available (would block)
    /// - `Err(SubscriptionError::Closed)` - The channel was closed
    pub fn try_recv(&mut self) -> Result<Option<T>, SubscriptionError> {
        loop {
            let event = match self.receiver.try_recv() {
                Ok(e) => e,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    self.note_lag(count);
                    continue;
                }
            };

            if self.filter.matches(&event) {
                return Ok(Some(event));
            }
        }
    }

    /// Get the filter for this subscription.
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Events this subscription lost by lagging behind the bus.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// A stream wrapper for subscriptions.
///
/// Implements `tokio_stream::Stream` for use with stream combinators.
/// Lagged gaps are skipped; the stream ends when the bus is dropped.
pub struct EventStream<T: Clone + Send + 'static> {
    inner: BroadcastStream<T>,
    filter: EventFilter,
    ticket: SubscriptionTicket,
}

impl<T: Clone + Send + Topical + 'static> EventStream<T> {
    /// Create a new event stream from a subscription.
    #[must_use]
    pub fn new(subscription: Subscription<T>) -> Self {
        let Subscription {
            receiver,
            filter,
            ticket,
            ..
        } = subscription;
        Self {
            inner: BroadcastStream::new(receiver),
            filter,
            ticket,
        }
    }

    /// Get the filter for this stream.
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}

impl<T: Clone + Send + Topical + 'static> Stream for EventStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    if self.filter.matches(&event) {
                        return Poll::Ready(Some(event));
                    }
                }
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(count)))) => {
                    warn!(
                        topics = ?self.ticket.tracked,
                        lagged = count,
                        "Event stream lagged, events dropped"
                    );
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
