//! # Metrics Sampler
//!
//! Copies subsystem stats into the Prometheus collectors on an interval.
//! Subsystems only keep atomics; this task owns the translation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use parley_telemetry::{
    advance_counter, BOOTSTRAP, CONFIG_UPDATES, CONNECTION_STATE, LOGOUTS, PENDING_REQUESTS,
    QUEUE_DEPTH, QUEUE_ENTRIES, REGISTRY_ENTRIES, REQUESTER_OUTCOMES, STATE_TRANSITIONS,
    TOKEN_REFRESHES,
};
use pl_01_pending_registry::{PendingRequestRegistry, RegistrySnapshot};
use pl_02_requester::{RequesterContext, RequesterSnapshot};
use pl_03_outbound_queue::{OutboundRequestQueue, QueueSnapshot};
use pl_04_connection_supervisor::{ConnectionSupervisor, SupervisorSnapshot};
use shared_types::ConnectionState;

/// Gauge code for a connection state.
pub fn state_code(state: ConnectionState) -> i64 {
    match state {
        ConnectionState::Uninitialized => 0,
        ConnectionState::Connecting => 1,
        ConnectionState::AsyncReady => 2,
        ConnectionState::ChatReady => 3,
        ConnectionState::Closed => 4,
    }
}

/// Samples subsystem stats into Prometheus.
pub struct MetricsSampler {
    registry: Arc<PendingRequestRegistry>,
    queue: Arc<OutboundRequestQueue>,
    supervisor: Arc<ConnectionSupervisor>,
    requesters: RequesterContext,
    last: Baseline,
}

/// Totals seen at the previous sample.
#[derive(Debug, Default)]
struct Baseline {
    registry: RegistrySnapshot,
    queue: QueueSnapshot,
    supervisor: SupervisorSnapshot,
    requester: RequesterSnapshot,
}

impl MetricsSampler {
    pub fn new(
        registry: Arc<PendingRequestRegistry>,
        queue: Arc<OutboundRequestQueue>,
        supervisor: Arc<ConnectionSupervisor>,
        requesters: RequesterContext,
    ) -> Self {
        Self {
            registry,
            queue,
            supervisor,
            requesters,
            last: Baseline::default(),
        }
    }

    /// Take one sample.
    pub fn sample(&mut self) {
        let registry = self.registry.snapshot();
        let queue = self.queue.snapshot();
        let supervisor = self.supervisor.snapshot();
        let requester = self.requesters.stats().snapshot();

        // Registry
        PENDING_REQUESTS.set(registry.pending as i64);
        let prev = &self.last.registry;
        for (outcome, before, now) in [
            ("registered", prev.total_registered, registry.total_registered),
            ("claimed", prev.total_claimed, registry.total_claimed),
            ("released", prev.total_released, registry.total_released),
            ("cleared", prev.total_cleared, registry.total_cleared),
            ("expired", prev.total_expired, registry.total_expired),
        ] {
            advance_counter(&REGISTRY_ENTRIES.with_label_values(&[outcome]), before, now);
        }

        // Queue
        QUEUE_DEPTH.set(queue.depth as i64);
        let prev = &self.last.queue;
        for (outcome, before, now) in [
            ("enqueued", prev.total_enqueued, queue.total_enqueued),
            ("flushed", prev.total_flushed, queue.total_flushed),
            ("failed", prev.total_failed, queue.total_failed),
            ("cancelled", prev.total_cancelled, queue.total_cancelled),
            ("withdrawn", prev.total_withdrawn, queue.total_withdrawn),
        ] {
            advance_counter(&QUEUE_ENTRIES.with_label_values(&[outcome]), before, now);
        }

        // Requester
        let prev = &self.last.requester;
        for (outcome, before, now) in [
            ("dispatched", prev.dispatched, requester.dispatched),
            ("deferred", prev.deferred, requester.deferred),
            ("succeeded", prev.succeeded, requester.succeeded),
            ("failed", prev.failed, requester.failed),
            ("timed_out", prev.timed_out, requester.timed_out),
            ("ignored_cached", prev.ignored_cached, requester.ignored_cached),
            ("routed", prev.routed, requester.routed),
            ("purged", prev.purged, requester.purged),
        ] {
            advance_counter(&REQUESTER_OUTCOMES.with_label_values(&[outcome]), before, now);
        }

        // Supervisor
        CONNECTION_STATE.set(state_code(supervisor.state));
        let prev = &self.last.supervisor;
        advance_counter(&STATE_TRANSITIONS, prev.transitions, supervisor.transitions);
        advance_counter(
            &BOOTSTRAP.with_label_values(&["attempt"]),
            prev.bootstrap_attempts,
            supervisor.bootstrap_attempts,
        );
        advance_counter(
            &BOOTSTRAP.with_label_values(&["exhausted"]),
            prev.bootstrap_failures,
            supervisor.bootstrap_failures,
        );
        advance_counter(
            &TOKEN_REFRESHES.with_label_values(&["success"]),
            prev.refresh_successes,
            supervisor.refresh_successes,
        );
        advance_counter(
            &TOKEN_REFRESHES.with_label_values(&["failure"]),
            prev.refresh_failures,
            supervisor.refresh_failures,
        );
        advance_counter(&LOGOUTS, prev.logouts, supervisor.logouts);
        advance_counter(&CONFIG_UPDATES, prev.config_updates, supervisor.config_updates);

        debug!(
            pending = registry.pending,
            queued = queue.depth,
            state = %supervisor.state,
            "Metrics sampled"
        );
        self.last = Baseline {
            registry,
            queue,
            supervisor,
            requester,
        };
    }

    /// Sample every `interval` until shutdown.
    pub async fn run(mut self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(interval_ms = interval.as_millis() as u64, "[metrics] Sampler started");
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    self.sample();
                    info!("[metrics] Shutdown signal received");
                    break;
                }
                _ = ticker.tick() => self.sample(),
            }
        }
    }
}
