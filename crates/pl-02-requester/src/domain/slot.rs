//! Per-exchange result slot.
//!
//! Every in-flight request owns exactly one `Exchange`. The slot moves
//! `Pending -> Resolved` or `Pending -> Cancelled`, never back. Dropping an
//! exchange that is still pending releases its registry entry and withdraws
//! the request from the outbound queue if it was never sent.

use crate::domain::routing::{Delivery, RouteTable};
use pl_01_pending_registry::PendingRequestRegistry;
use pl_03_outbound_queue::OutboundRequestQueue;
use shared_types::CorrelationKey;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

/// Resolution state of one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Pending,
    Resolved,
    Cancelled,
}

/// Guard for one in-flight request.
pub struct Exchange {
    key: CorrelationKey,
    registry: Arc<PendingRequestRegistry>,
    queue: Arc<OutboundRequestQueue>,
    routes: Arc<RouteTable>,
    state: SlotState,
}

impl Exchange {
    /// Open an exchange for a key that is already registered.
    ///
    /// Returns the exchange and its mailbox, through which another waiter
    /// forwards an envelope it claimed on this exchange's behalf.
    pub fn open(
        key: CorrelationKey,
        registry: Arc<PendingRequestRegistry>,
        queue: Arc<OutboundRequestQueue>,
        routes: Arc<RouteTable>,
    ) -> (Self, oneshot::Receiver<Delivery>) {
        let mailbox = routes.open(key.clone());
        let exchange = Self {
            key,
            registry,
            queue,
            routes,
            state: SlotState::Pending,
        };
        (exchange, mailbox)
    }

    pub fn key(&self) -> &CorrelationKey {
        &self.key
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    /// Move to `Resolved`. Returns false if the slot already left `Pending`.
    pub fn resolve(&mut self) -> bool {
        if self.state != SlotState::Pending {
            return false;
        }
        self.state = SlotState::Resolved;
        self.routes.close(&self.key);
        true
    }

    /// Move to `Cancelled`, release the registry entry and withdraw the
    /// request if it is still queued.
    ///
    /// Returns true if the entry was still registered.
    pub fn cancel(&mut self) -> bool {
        if self.state != SlotState::Pending {
            return false;
        }
        self.state = SlotState::Cancelled;
        self.routes.close(&self.key);
        let released = self.registry.release(&self.key);
        let withdrawn = self.queue.withdraw(&self.key);
        debug!(
            key = %self.key,
            released = released,
            withdrawn = withdrawn,
            "Exchange cancelled"
        );
        released
    }
}

impl Drop for Exchange {
    fn drop(&mut self) {
        self.cancel();
    }
}
