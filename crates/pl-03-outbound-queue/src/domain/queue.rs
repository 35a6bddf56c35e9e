//! Deferred-dispatch FIFO.

use crate::error::QueueError;
use parking_lot::Mutex;
use shared_types::{CorrelationKey, OutboundRequest, RemoteService};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Statistics for the outbound queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total entries enqueued
    pub total_enqueued: AtomicU64,
    /// Total entries sent by a flush
    pub total_flushed: AtomicU64,
    /// Total entries whose send failed during a flush
    pub total_failed: AtomicU64,
    /// Total entries dropped by `cancel_all()`
    pub total_cancelled: AtomicU64,
    /// Total entries taken back by their owner before a flush
    pub total_withdrawn: AtomicU64,
}

/// Point-in-time copy of [`QueueStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub depth: usize,
    pub total_enqueued: u64,
    pub total_flushed: u64,
    pub total_failed: u64,
    pub total_cancelled: u64,
    pub total_withdrawn: u64,
}

/// Outcome of one `flush_all()`.
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Keys handed to the remote service, in send order.
    pub sent: Vec<CorrelationKey>,
    /// Entries the remote service rejected.
    pub failed: Vec<QueueError>,
}

impl FlushReport {
    /// Number of entries drained.
    pub fn total(&self) -> usize {
        self.sent.len() + self.failed.len()
    }

    /// True when every drained entry was sent.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// FIFO of requests awaiting a ready connection.
pub struct OutboundRequestQueue {
    entries: Mutex<VecDeque<OutboundRequest>>,
    stats: QueueStats,
}

impl OutboundRequestQueue {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            stats: QueueStats::default(),
        }
    }

    /// Append an entry to the back of the queue.
    pub fn enqueue(&self, request: OutboundRequest) {
        debug!(
            key = %request.key,
            operation = request.body.operation(),
            "Deferred outbound request"
        );
        self.entries.lock().push_back(request);
        self.stats.total_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Send every queued entry to `remote`, preserving insertion order.
    ///
    /// The queue is drained before the first send, so entries enqueued while
    /// the flush is in progress wait for the next flush. A failed send does
    /// not stop the flush.
    pub async fn flush_all(&self, remote: &dyn RemoteService) -> FlushReport {
        let drained: Vec<OutboundRequest> = self.entries.lock().drain(..).collect();
        let mut report = FlushReport::default();
        if drained.is_empty() {
            return report;
        }

        for request in drained {
            let key = request.key.clone();
            match remote.send(request).await {
                Ok(()) => report.sent.push(key),
                Err(source) => {
                    warn!(key = %key, error = %source, "Queued request send failed");
                    report.failed.push(QueueError::SendFailed { key, source });
                }
            }
        }

        self.stats
            .total_flushed
            .fetch_add(report.sent.len() as u64, Ordering::Relaxed);
        self.stats
            .total_failed
            .fetch_add(report.failed.len() as u64, Ordering::Relaxed);
        info!(
            sent = report.sent.len(),
            failed = report.failed.len(),
            "Flushed outbound queue"
        );
        report
    }

    /// Drop every queued entry without sending.
    ///
    /// Returns the number of entries dropped.
    pub fn cancel_all(&self) -> usize {
        let dropped = {
            let mut entries = self.entries.lock();
            let n = entries.len();
            entries.clear();
            n
        };
        self.stats
            .total_cancelled
            .fetch_add(dropped as u64, Ordering::Relaxed);
        if dropped > 0 {
            info!(dropped = dropped, "Cancelled outbound queue");
        }
        dropped
    }

    /// Remove the entry for `key` without sending it.
    ///
    /// Used when the owner of a deferred request gives up on it. Returns
    /// true if the entry was still queued; false once a flush has taken it.
    pub fn withdraw(&self, key: &CorrelationKey) -> bool {
        let withdrawn = {
            let mut entries = self.entries.lock();
            match entries.iter().position(|r| &r.key == key) {
                Some(index) => entries.remove(index).is_some(),
                None => false,
            }
        };
        if withdrawn {
            self.stats.total_withdrawn.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Withdrew queued request");
        }
        withdrawn
    }

    /// Current depth.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Keys currently queued, front first.
    pub fn keys(&self) -> Vec<CorrelationKey> {
        self.entries.lock().iter().map(|r| r.key.clone()).collect()
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            depth: self.len(),
            total_enqueued: self.stats.total_enqueued.load(Ordering::Relaxed),
            total_flushed: self.stats.total_flushed.load(Ordering::Relaxed),
            total_failed: self.stats.total_failed.load(Ordering::Relaxed),
            total_cancelled: self.stats.total_cancelled.load(Ordering::Relaxed),
            total_withdrawn: self.stats.total_withdrawn.load(Ordering::Relaxed),
        }
    }
}

impl Default for OutboundRequestQueue {
    fn default() -> Self {
        Self::new()
    }
}
