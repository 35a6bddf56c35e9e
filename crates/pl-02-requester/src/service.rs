//! Correlated requester service.
//!
//! Turns "send an operation and wait for the matching pushed event" into a
//! single awaitable call that resolves at most once.
//!
//! ```text
//! send()
//!   1. key = <prefix>-<uuid>
//!   2. registry.register(key), routes.open(key)
//!   3. subscribe(responses[topic]), subscribe(errors)
//!   4. remote.send() | queue.enqueue()
//!   5. loop:
//!        envelope names key       => registry.claim(key)            => resolve
//!        envelope names prefix    => first sight? registry.claim(prefix)
//!                                      own entry   => resolve
//!                                      other entry => forward to its mailbox
//!        mailbox delivery         => resolve
//!        eviction and entry gone  => Purged
//! ```
//!
//! Returning from `send` drops both subscriptions. Dropping the future
//! before it returns releases the registry entry and withdraws a request
//! that is still queued.

use crate::domain::{Delivery, Exchange, RequestKind, RouteTable};
use crate::error::RequesterError;
use pl_01_pending_registry::PendingRequestRegistry;
use pl_03_outbound_queue::OutboundRequestQueue;
use shared_bus::{EventFilter, InMemoryEventBus};
use shared_types::{
    ConnectionState, CorrelationKey, ErrorEnvelope, OutboundRequest, RemoteService, ResponseEnvelope,
};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, warn};

/// Statistics shared by every requester built from one context
#[derive(Debug, Default)]
pub struct RequesterStats {
    /// Requests sent straight to the remote service
    pub dispatched: AtomicU64,
    /// Requests placed on the outbound queue
    pub deferred: AtomicU64,
    /// Exchanges resolved with a success payload
    pub succeeded: AtomicU64,
    /// Exchanges resolved with a domain error
    pub failed: AtomicU64,
    /// Exchanges abandoned by `send_timeout`
    pub timed_out: AtomicU64,
    /// Cached envelopes skipped by kinds that refuse them
    pub ignored_cached: AtomicU64,
    /// Prefix envelopes forwarded to the exchange owning the claimed entry
    pub routed: AtomicU64,
    /// Exchanges ended because their entry was voided
    pub purged: AtomicU64,
}

/// Point-in-time copy of [`RequesterStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequesterSnapshot {
    pub dispatched: u64,
    pub deferred: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub ignored_cached: u64,
    pub routed: u64,
    pub purged: u64,
}

impl RequesterStats {
    pub fn snapshot(&self) -> RequesterSnapshot {
        RequesterSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            ignored_cached: self.ignored_cached.load(Ordering::Relaxed),
            routed: self.routed.load(Ordering::Relaxed),
            purged: self.purged.load(Ordering::Relaxed),
        }
    }
}

/// Collaborators shared by every requester kind.
#[derive(Clone)]
pub struct RequesterContext {
    registry: Arc<PendingRequestRegistry>,
    bus: InMemoryEventBus,
    remote: Arc<dyn RemoteService>,
    queue: Arc<OutboundRequestQueue>,
    routes: Arc<RouteTable>,
    readiness: Option<watch::Receiver<ConnectionState>>,
    stats: Arc<RequesterStats>,
}

impl RequesterContext {
    pub fn new(
        registry: Arc<PendingRequestRegistry>,
        bus: InMemoryEventBus,
        remote: Arc<dyn RemoteService>,
        queue: Arc<OutboundRequestQueue>,
    ) -> Self {
        Self {
            registry,
            bus,
            remote,
            queue,
            routes: Arc::new(RouteTable::new()),
            readiness: None,
            stats: Arc::new(RequesterStats::default()),
        }
    }

    /// Let queueable sends go out immediately while the connection is
    /// `ChatReady`. Without a readiness watch every queueable send is
    /// deferred.
    pub fn with_readiness(mut self, readiness: watch::Receiver<ConnectionState>) -> Self {
        self.readiness = Some(readiness);
        self
    }

    /// Requester for one kind.
    pub fn requester<K: RequestKind>(&self) -> Requester<K> {
        Requester {
            ctx: self.clone(),
            _kind: PhantomData,
        }
    }

    pub fn stats(&self) -> &RequesterStats {
        &self.stats
    }

    /// Exchanges currently waiting for an answer.
    pub fn in_flight(&self) -> usize {
        self.routes.len()
    }

    fn is_ready(&self) -> bool {
        self.readiness
            .as_ref()
            .is_some_and(|rx| rx.borrow().is_connected())
    }
}

/// Single-resolution request/response for kind `K`.
///
/// Cheap to clone. Each `send` call is one exchange with one key.
pub struct Requester<K: RequestKind> {
    ctx: RequesterContext,
    _kind: PhantomData<fn() -> K>,
}

impl<K: RequestKind> Clone for Requester<K> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K: RequestKind> Requester<K> {
    /// Send a request and wait for the matching answer.
    ///
    /// With `queueable`, the request is deferred to the outbound queue
    /// unless the connection is ready. There is no built-in timeout; see
    /// [`Requester::send_timeout`]. If the registry is purged while waiting
    /// (session reset, credential rejection, age sweep) the call ends with
    /// [`RequesterError::Purged`].
    pub async fn send(
        &self,
        request: K::Request,
        queueable: bool,
    ) -> Result<K::Response, RequesterError> {
        let key = CorrelationKey::generate(K::PREFIX);
        let body = K::into_body(request);

        // Watch evictions before registering so a purge in between is seen.
        let mut evictions = self.ctx.registry.subscribe_evictions();
        self.ctx.registry.register(key.clone(), body.clone())?;
        let (mut exchange, mut mailbox) = Exchange::open(
            key.clone(),
            self.ctx.registry.clone(),
            self.ctx.queue.clone(),
            self.ctx.routes.clone(),
        );

        // Subscribe before dispatch so an immediate answer is not missed.
        let mut responses = self.ctx.bus.subscribe_responses(EventFilter::topic(K::TOPIC));
        let mut errors = self.ctx.bus.subscribe_errors();

        self.dispatch(OutboundRequest::new(key.clone(), body), queueable)
            .await?;

        let mut mailbox_open = true;
        let mut evictions_open = true;
        let outcome = loop {
            let step = tokio::select! {
                delivered = &mut mailbox, if mailbox_open => match delivered {
                    Ok(delivery) => self.accept_delivery(&key, delivery),
                    Err(_) => {
                        mailbox_open = false;
                        None
                    }
                },
                event = responses.recv() => {
                    let envelope = event.ok_or(RequesterError::BusClosed)?;
                    self.on_response(&key, envelope)
                }
                event = errors.recv() => {
                    let envelope = event.ok_or(RequesterError::BusClosed)?;
                    self.on_error(&key, envelope)
                }
                changed = evictions.changed(), if evictions_open => match changed {
                    Ok(()) => self.voided(&key).then_some(Err(RequesterError::Purged)),
                    Err(_) => {
                        evictions_open = false;
                        None
                    }
                },
            };
            if let Some(outcome) = step {
                break outcome;
            }
        };
        drop((responses, errors));

        match &outcome {
            Ok(_) => {
                exchange.resolve();
                self.ctx.stats.succeeded.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Request resolved");
            }
            Err(RequesterError::Purged) => {
                exchange.cancel();
                self.ctx.stats.purged.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, "Request voided while waiting");
            }
            Err(err) => {
                exchange.resolve();
                self.ctx.stats.failed.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, error = %err, "Request failed");
            }
        }
        outcome
    }

    /// `send` raced against a timer. On expiry the registry entry is
    /// released, a still-queued request is withdrawn and `TimedOut` is
    /// returned.
    pub async fn send_timeout(
        &self,
        request: K::Request,
        queueable: bool,
        after: Duration,
    ) -> Result<K::Response, RequesterError> {
        match tokio::time::timeout(after, self.send(request, queueable)).await {
            Ok(result) => result,
            Err(_) => {
                self.ctx.stats.timed_out.fetch_add(1, Ordering::Relaxed);
                warn!(operation = K::PREFIX, after_ms = after.as_millis(), "Request timed out");
                Err(RequesterError::TimedOut {
                    operation: K::PREFIX,
                    after,
                })
            }
        }
    }

    async fn dispatch(&self, request: OutboundRequest, queueable: bool) -> Result<(), RequesterError> {
        if queueable && !self.ctx.is_ready() {
            self.ctx.queue.enqueue(request);
            self.ctx.stats.deferred.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }
        self.ctx.remote.send(request).await?;
        self.ctx.stats.dispatched.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn voided(&self, key: &CorrelationKey) -> bool {
        self.ctx.routes.close_if_voided(&self.ctx.registry, key)
    }

    fn on_response(
        &self,
        key: &CorrelationKey,
        envelope: ResponseEnvelope,
    ) -> Option<Result<K::Response, RequesterError>> {
        if !envelope.satisfies(key) {
            return None;
        }
        if self.voided(key) {
            return Some(Err(RequesterError::Purged));
        }
        if envelope.cached && !K::ACCEPTS_CACHED {
            self.ctx.stats.ignored_cached.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Ignoring cached envelope");
            return None;
        }
        let response = K::extract(&envelope.payload)?;
        if envelope.addresses(key) {
            self.ctx.registry.claim(key.as_str())?;
            return Some(Ok(response));
        }
        if self.claim_by_prefix(key, envelope.id, || Delivery::Response(envelope.clone())) {
            return Some(Ok(response));
        }
        None
    }

    fn on_error(
        &self,
        key: &CorrelationKey,
        envelope: ErrorEnvelope,
    ) -> Option<Result<K::Response, RequesterError>> {
        if !envelope.satisfies(key) {
            return None;
        }
        if self.voided(key) {
            return Some(Err(RequesterError::Purged));
        }
        if envelope.addresses(key) {
            self.ctx.registry.claim(key.as_str())?;
            return Some(Err(RequesterError::Failed(envelope)));
        }
        if self.claim_by_prefix(key, envelope.id, || Delivery::Error(envelope.clone())) {
            return Some(Err(RequesterError::Failed(envelope)));
        }
        None
    }

    /// Make the one claim a prefix envelope is entitled to.
    ///
    /// Returns true when the claimed entry is this exchange's own. A claimed
    /// entry owned by another exchange is forwarded to its mailbox.
    fn claim_by_prefix(
        &self,
        key: &CorrelationKey,
        envelope_id: uuid::Uuid,
        delivery: impl FnOnce() -> Delivery,
    ) -> bool {
        if !self.ctx.routes.first_sight(envelope_id) {
            return false;
        }
        let Some((entry, owner)) = self.ctx.routes.claim(&self.ctx.registry, key.prefix()) else {
            return false;
        };
        if &entry.key == key {
            return true;
        }
        self.forward(&entry.key, owner, delivery());
        false
    }

    fn forward(
        &self,
        owner_key: &CorrelationKey,
        owner: Option<oneshot::Sender<Delivery>>,
        delivery: Delivery,
    ) {
        match owner.map(|tx| tx.send(delivery)) {
            Some(Ok(())) => {
                self.ctx.stats.routed.fetch_add(1, Ordering::Relaxed);
                debug!(key = %owner_key, "Forwarded prefix envelope to its owner");
            }
            Some(Err(_)) | None => {
                warn!(key = %owner_key, "Claimed entry has no waiting owner");
            }
        }
    }

    fn accept_delivery(
        &self,
        key: &CorrelationKey,
        delivery: Delivery,
    ) -> Option<Result<K::Response, RequesterError>> {
        match delivery {
            Delivery::Error(envelope) => Some(Err(RequesterError::Failed(envelope))),
            Delivery::Response(envelope) => match K::extract(&envelope.payload) {
                Some(response) => Some(Ok(response)),
                None => {
                    error!(key = %key, "Forwarded envelope does not fit this request kind");
                    None
                }
            },
        }
    }
}
