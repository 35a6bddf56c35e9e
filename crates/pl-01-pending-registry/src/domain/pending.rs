//! Pending request entry.

use shared_types::{CorrelationKey, RequestBody};
use std::time::{Duration, Instant};

/// An in-flight request owned by the registry until claimed or cleared.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// Correlation key the answer will carry.
    pub key: CorrelationKey,
    /// The outbound request body.
    pub payload: RequestBody,
    /// When the entry was registered.
    pub enqueued_at: Instant,
}

impl PendingRequest {
    pub fn new(key: CorrelationKey, payload: RequestBody) -> Self {
        Self {
            key,
            payload,
            enqueued_at: Instant::now(),
        }
    }

    /// Time since registration.
    pub fn age(&self) -> Duration {
        self.enqueued_at.elapsed()
    }
}
