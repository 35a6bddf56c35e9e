//! Hand-off of claimed entries between exchanges.
//!
//! An envelope that names only a kind prefix is seen by every waiter of that
//! kind, but it must be claimed once. The first waiter to see it claims the
//! oldest pending entry of the kind. That entry may belong to a different
//! waiter, in which case the claimer forwards the envelope to the owner's
//! mailbox.
//!
//! ```text
//! envelope(prefix) ──first_sight──→ claim(prefix) ──own key──→ resolve
//!                                        └──other key──→ mailbox[key] → owner resolves
//! ```
//!
//! Claiming an entry and taking its owner's mailbox happen under one lock,
//! as do the "was my entry voided?" check and closing the mailbox. An owner
//! that finds its entry gone and its mailbox still open was voided by a
//! registry purge, not claimed.

use parking_lot::Mutex;
use pl_01_pending_registry::{PendingRequest, PendingRequestRegistry};
use shared_types::{CorrelationKey, ErrorEnvelope, ResponseEnvelope};
use std::collections::{HashMap, VecDeque};
use tokio::sync::oneshot;
use uuid::Uuid;

/// How many prefix envelope ids are remembered for de-duplication.
const SEEN_CAPACITY: usize = 1024;

/// Outcome forwarded to the owner of a claimed entry.
#[derive(Debug, Clone)]
pub enum Delivery {
    Response(ResponseEnvelope),
    Error(ErrorEnvelope),
}

/// Mailboxes of the live exchanges plus the ids of prefix envelopes
/// that have already been claimed for.
#[derive(Debug, Default)]
pub struct RouteTable {
    mailboxes: Mutex<HashMap<CorrelationKey, oneshot::Sender<Delivery>>>,
    seen: Mutex<VecDeque<Uuid>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the mailbox for `key`.
    pub fn open(&self, key: CorrelationKey) -> oneshot::Receiver<Delivery> {
        let (tx, rx) = oneshot::channel();
        self.mailboxes.lock().insert(key, tx);
        rx
    }

    /// Close the mailbox for `key`. Returns true if it was still open.
    pub fn close(&self, key: &CorrelationKey) -> bool {
        self.mailboxes.lock().remove(key).is_some()
    }

    /// Record envelope `id`. True only for the first caller.
    pub fn first_sight(&self, id: Uuid) -> bool {
        let mut seen = self.seen.lock();
        if seen.contains(&id) {
            return false;
        }
        if seen.len() == SEEN_CAPACITY {
            seen.pop_front();
        }
        seen.push_back(id);
        true
    }

    /// Claim the oldest entry for `prefix` and take its owner's mailbox.
    ///
    /// The mailbox is `None` when the entry has no live exchange.
    pub fn claim(
        &self,
        registry: &PendingRequestRegistry,
        prefix: &str,
    ) -> Option<(PendingRequest, Option<oneshot::Sender<Delivery>>)> {
        let mut mailboxes = self.mailboxes.lock();
        let entry = registry.claim(prefix)?;
        let owner = mailboxes.remove(&entry.key);
        Some((entry, owner))
    }

    /// True if the entry for `key` was voided by the registry rather than
    /// claimed. Closes the mailbox in that case.
    pub fn close_if_voided(&self, registry: &PendingRequestRegistry, key: &CorrelationKey) -> bool {
        let mut mailboxes = self.mailboxes.lock();
        !registry.contains(key) && mailboxes.remove(key).is_some()
    }

    /// Open mailboxes.
    pub fn len(&self) -> usize {
        self.mailboxes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
