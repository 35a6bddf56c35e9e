//! Pending Request Registry - the single authoritative consumption point.
//!
//! Maps correlation keys to in-flight requests. Any number of requesters may
//! race to claim the same entry; exactly one wins.
//!
//! Flow:
//! 1. Requester generates a `CorrelationKey`
//! 2. Requester calls `register()` with the outbound payload
//! 3. Transport publishes an envelope naming the key (or its prefix)
//! 4. Requester calls `claim()`; the winner gets the entry, everyone else `None`
//! 5. On reconnect or credential rejection, `clear()` voids everything
//!
//! Owners learn that their entry was voided (rather than claimed) through
//! `subscribe_evictions()`, which ticks after every `clear()` or age sweep
//! that removed something.

use crate::domain::pending::PendingRequest;
use crate::error::RegistryError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shared_types::{CorrelationKey, RequestBody};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Statistics for the pending request registry
#[derive(Debug, Default)]
pub struct RegistryStats {
    /// Total entries registered
    pub total_registered: AtomicU64,
    /// Total entries claimed by a requester
    pub total_claimed: AtomicU64,
    /// Total entries released by their owner (cancel/timeout)
    pub total_released: AtomicU64,
    /// Total entries voided by `clear()`
    pub total_cleared: AtomicU64,
    /// Total entries swept by age
    pub total_expired: AtomicU64,
    /// Total duplicate registrations rejected
    pub duplicate_rejections: AtomicU64,
}

/// Point-in-time copy of [`RegistryStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub pending: usize,
    pub total_registered: u64,
    pub total_claimed: u64,
    pub total_released: u64,
    pub total_cleared: u64,
    pub total_expired: u64,
    pub duplicate_rejections: u64,
}

/// Process-wide map from correlation key to in-flight request.
pub struct PendingRequestRegistry {
    /// Map of correlation key to pending request
    pending: DashMap<CorrelationKey, PendingRequest>,
    /// Statistics
    stats: RegistryStats,
    /// Eviction epoch, bumped whenever entries are voided in bulk
    evictions: watch::Sender<u64>,
}

impl PendingRequestRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        let (evictions, _) = watch::channel(0);
        Self {
            pending: DashMap::new(),
            stats: RegistryStats::default(),
            evictions,
        }
    }

    /// Watch the eviction epoch.
    ///
    /// The value changes after `clear()` or `remove_older_than()` removed at
    /// least one entry. A waiter whose key is then no longer `contains()`ed
    /// was voided and will never be claimed.
    pub fn subscribe_evictions(&self) -> watch::Receiver<u64> {
        self.evictions.subscribe()
    }

    fn bump_evictions(&self) {
        self.evictions.send_modify(|epoch| *epoch += 1);
    }

    /// Register an in-flight request.
    ///
    /// Fails with `DuplicateKey` if the key is already present; the existing
    /// entry is left untouched.
    pub fn register(&self, key: CorrelationKey, payload: RequestBody) -> Result<(), RegistryError> {
        match self.pending.entry(key.clone()) {
            Entry::Occupied(_) => {
                self.stats
                    .duplicate_rejections
                    .fetch_add(1, Ordering::Relaxed);
                error!(key = %key, "Duplicate correlation key rejected");
                Err(RegistryError::DuplicateKey(key))
            }
            Entry::Vacant(slot) => {
                debug!(
                    key = %key,
                    operation = payload.operation(),
                    "Registered pending request"
                );
                slot.insert(PendingRequest::new(key, payload));
                self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
        }
    }

    /// Claim and remove the entry selected by `matcher`.
    ///
    /// `matcher` is either a full key or a bare request-kind prefix (see
    /// `CorrelationKey::matches`). With a prefix, the oldest matching entry is
    /// claimed. Under concurrent calls each entry is handed to at most one
    /// claimant: removal from the map is the linearization point.
    pub fn claim(&self, matcher: &str) -> Option<PendingRequest> {
        // Exact key: O(1).
        if let Some((_, entry)) = self.pending.remove(matcher) {
            return Some(self.on_claimed(entry));
        }

        // Prefix: collect candidates without holding shard locks, then race
        // to remove them oldest first.
        let mut candidates: Vec<(Instant, CorrelationKey)> = self
            .pending
            .iter()
            .filter(|entry| entry.key().matches(matcher))
            .map(|entry| (entry.value().enqueued_at, entry.key().clone()))
            .collect();
        candidates.sort();

        for (_, key) in candidates {
            if let Some((_, entry)) = self.pending.remove(&key) {
                return Some(self.on_claimed(entry));
            }
        }
        None
    }

    fn on_claimed(&self, entry: PendingRequest) -> PendingRequest {
        self.stats.total_claimed.fetch_add(1, Ordering::Relaxed);
        debug!(
            key = %entry.key,
            waited_ms = entry.age().as_millis(),
            "Claimed pending request"
        );
        entry
    }

    /// Remove one entry on behalf of its owner (cancellation or timeout).
    ///
    /// Returns true if the entry was still present.
    pub fn release(&self, key: &CorrelationKey) -> bool {
        if self.pending.remove(key).is_some() {
            self.stats.total_released.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Released pending request");
            true
        } else {
            false
        }
    }

    /// Void every entry unconditionally.
    ///
    /// Returns the number of entries removed.
    pub fn clear(&self) -> usize {
        let keys: Vec<CorrelationKey> = self.pending.iter().map(|e| e.key().clone()).collect();
        let removed = keys
            .iter()
            .filter(|key| self.pending.remove(*key).is_some())
            .count();
        self.stats
            .total_cleared
            .fetch_add(removed as u64, Ordering::Relaxed);
        if removed > 0 {
            info!(removed = removed, "Cleared pending request registry");
            self.bump_evictions();
        }
        removed
    }

    /// Remove entries older than `max_age`.
    ///
    /// Returns the number of entries removed.
    pub fn remove_older_than(&self, max_age: Duration) -> usize {
        let mut removed = 0;
        self.pending.retain(|key, request| {
            let age = request.age();
            if age > max_age {
                warn!(
                    key = %key,
                    age_ms = age.as_millis(),
                    "Removing stale pending request"
                );
                removed += 1;
                false
            } else {
                true
            }
        });
        self.stats
            .total_expired
            .fetch_add(removed as u64, Ordering::Relaxed);
        if removed > 0 {
            self.bump_evictions();
        }
        removed
    }

    /// Get number of currently pending requests
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True when nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Check if a key is pending
    pub fn contains(&self, key: &CorrelationKey) -> bool {
        self.pending.contains_key(key)
    }

    /// Get statistics
    pub fn stats(&self) -> &RegistryStats {
        &self.stats
    }

    /// Copy the current statistics
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            pending: self.len(),
            total_registered: self.stats.total_registered.load(Ordering::Relaxed),
            total_claimed: self.stats.total_claimed.load(Ordering::Relaxed),
            total_released: self.stats.total_released.load(Ordering::Relaxed),
            total_cleared: self.stats.total_cleared.load(Ordering::Relaxed),
            total_expired: self.stats.total_expired.load(Ordering::Relaxed),
            duplicate_rejections: self.stats.duplicate_rejections.load(Ordering::Relaxed),
        }
    }
}

impl Default for PendingRequestRegistry {
    fn default() -> Self {
        Self::new()
    }
}
