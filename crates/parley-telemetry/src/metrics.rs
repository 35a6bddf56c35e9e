//! Prometheus metrics for the Parley client.
//!
//! All metrics follow the naming convention: `parley_<component>_<metric>`
//!
//! Subsystem crates keep their own atomic counters; the runtime samples
//! them into these collectors. Counters only move forward by the delta
//! since the previous sample.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // PENDING REGISTRY (Subsystem 1)
    // =========================================================================

    /// Requests currently waiting for an answer
    pub static ref PENDING_REQUESTS: IntGauge = IntGauge::new(
        "parley_registry_pending_requests",
        "Number of in-flight requests in the pending registry"
    ).expect("metric creation failed");

    /// Registry entry lifecycle
    pub static ref REGISTRY_ENTRIES: IntCounterVec = IntCounterVec::new(
        Opts::new("parley_registry_entries_total", "Pending registry entries by outcome"),
        &["outcome"]  // registered/claimed/released/cleared/expired
    ).expect("metric creation failed");

    // =========================================================================
    // REQUESTER (Subsystem 2)
    // =========================================================================

    /// Exchange results
    pub static ref REQUESTER_OUTCOMES: IntCounterVec = IntCounterVec::new(
        Opts::new("parley_requester_outcomes_total", "Requester exchanges by outcome"),
        &["outcome"]  // dispatched/deferred/succeeded/failed/timed_out/ignored_cached/routed/purged
    ).expect("metric creation failed");

    // =========================================================================
    // OUTBOUND QUEUE (Subsystem 3)
    // =========================================================================

    /// Current queue depth
    pub static ref QUEUE_DEPTH: IntGauge = IntGauge::new(
        "parley_queue_depth",
        "Requests waiting in the outbound queue"
    ).expect("metric creation failed");

    /// Queue entries by outcome
    pub static ref QUEUE_ENTRIES: IntCounterVec = IntCounterVec::new(
        Opts::new("parley_queue_entries_total", "Outbound queue entries by outcome"),
        &["outcome"]  // enqueued/flushed/failed/cancelled/withdrawn
    ).expect("metric creation failed");

    // =========================================================================
    // CONNECTION SUPERVISOR (Subsystem 4)
    // =========================================================================

    /// Current connection state (0 uninitialized .. 4 closed)
    pub static ref CONNECTION_STATE: IntGauge = IntGauge::new(
        "parley_connection_state",
        "Connection state code: 0 uninitialized, 1 connecting, 2 async_ready, 3 chat_ready, 4 closed"
    ).expect("metric creation failed");

    /// State transitions
    pub static ref STATE_TRANSITIONS: IntCounter = IntCounter::new(
        "parley_connection_transitions_total",
        "Total connection state transitions"
    ).expect("metric creation failed");

    /// Bootstrap download attempts and failures
    pub static ref BOOTSTRAP: IntCounterVec = IntCounterVec::new(
        Opts::new("parley_bootstrap_total", "Bootstrap download activity"),
        &["event"]  // attempt/exhausted
    ).expect("metric creation failed");

    /// Credential refresh results
    pub static ref TOKEN_REFRESHES: IntCounterVec = IntCounterVec::new(
        Opts::new("parley_token_refreshes_total", "Credential refreshes by result"),
        &["result"]  // success/failure
    ).expect("metric creation failed");

    /// Full logouts
    pub static ref LOGOUTS: IntCounter = IntCounter::new(
        "parley_logouts_total",
        "Total forced logouts"
    ).expect("metric creation failed");

    /// Remote configuration changes picked up by re-checks
    pub static ref CONFIG_UPDATES: IntCounter = IntCounter::new(
        "parley_config_updates_total",
        "Remote configuration changes detected after disconnect"
    ).expect("metric creation failed");

    // =========================================================================
    // ERRORS
    // =========================================================================

    /// Domain errors seen on the shared error channel
    pub static ref DOMAIN_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("parley_domain_errors_total", "Domain errors by code"),
        &["code"]
    ).expect("metric creation failed");
}

/// Handle proving metrics were registered.
#[derive(Debug)]
pub struct MetricsHandle {
    registered: usize,
}

impl MetricsHandle {
    /// Number of collectors registered by this call.
    pub fn registered(&self) -> usize {
        self.registered
    }
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; collectors already registered are skipped.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Registry
        Box::new(PENDING_REQUESTS.clone()),
        Box::new(REGISTRY_ENTRIES.clone()),
        // Requester
        Box::new(REQUESTER_OUTCOMES.clone()),
        // Queue
        Box::new(QUEUE_DEPTH.clone()),
        Box::new(QUEUE_ENTRIES.clone()),
        // Supervisor
        Box::new(CONNECTION_STATE.clone()),
        Box::new(STATE_TRANSITIONS.clone()),
        Box::new(BOOTSTRAP.clone()),
        Box::new(TOKEN_REFRESHES.clone()),
        Box::new(LOGOUTS.clone()),
        Box::new(CONFIG_UPDATES.clone()),
        // Errors
        Box::new(DOMAIN_ERRORS.clone()),
    ];

    let mut registered = 0;
    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) => registered += 1,
            Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle { registered })
}

/// Encode all metrics as Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Advance a counter to `total`, given the total seen at the last sample.
///
/// Returns the new baseline. A total lower than the baseline (source
/// restarted) only resets the baseline.
pub fn advance_counter(counter: &IntCounter, previous: u64, total: u64) -> u64 {
    if total > previous {
        counter.inc_by(total - previous);
    }
    total
}
