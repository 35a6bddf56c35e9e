//! # Service Container
//!
//! Holds all subsystem instances and wires them together.
//!
//! ## Initialization Order
//!
//! ```text
//! Level 0: Event bus
//! Level 1: Pending registry, outbound queue, transport
//! Level 2: Connection supervisor (registry, queue, transport, bus)
//! Level 3: Requester context (all of the above + supervisor readiness)
//! ```
//!
//! Every subsystem is shared through `Arc`; the bus is cheap to clone.

use std::sync::Arc;

use tracing::{info, instrument};

use pl_01_pending_registry::PendingRequestRegistry;
use pl_02_requester::RequesterContext;
use pl_03_outbound_queue::OutboundRequestQueue;
use pl_04_connection_supervisor::{
    ConnectionSupervisor, InMemoryConfigCache, InMemoryTokenStore, NoopSessionReset,
    SupervisorPorts,
};
use shared_bus::InMemoryEventBus;

use crate::adapters::{LocalCredentialRefresher, LoopbackRemote, StaticConfigDownloader};
use crate::container::config::ClientConfig;

/// Central container holding all subsystem instances.
pub struct ClientContainer {
    // =========================================================================
    // LEVEL 0
    // =========================================================================
    /// Event bus shared by the transport and every subscriber.
    pub bus: InMemoryEventBus,

    // =========================================================================
    // LEVEL 1
    // =========================================================================
    /// Pending Registry (Subsystem 1)
    pub registry: Arc<PendingRequestRegistry>,

    /// Outbound Queue (Subsystem 3)
    pub queue: Arc<OutboundRequestQueue>,

    /// Loopback transport.
    pub remote: Arc<LoopbackRemote>,

    // =========================================================================
    // LEVEL 2
    // =========================================================================
    /// Connection Supervisor (Subsystem 4)
    pub supervisor: Arc<ConnectionSupervisor>,

    pub downloader: Arc<StaticConfigDownloader>,
    pub refresher: Arc<LocalCredentialRefresher>,
    pub tokens: Arc<InMemoryTokenStore>,

    // =========================================================================
    // LEVEL 3
    // =========================================================================
    /// Requester (Subsystem 2) collaborators.
    pub requesters: RequesterContext,

    /// Client configuration (immutable after initialization).
    pub config: ClientConfig,
}

impl ClientContainer {
    /// Create a container with the loopback transport and session adapters.
    #[instrument(name = "container_init", skip(config))]
    pub fn new(config: ClientConfig) -> Self {
        Self::with_downloader(config, Arc::new(StaticConfigDownloader::loopback()))
    }

    /// Create a container serving configuration from `downloader`.
    pub fn with_downloader(config: ClientConfig, downloader: Arc<StaticConfigDownloader>) -> Self {
        info!("Initializing Parley client container");

        let bus = InMemoryEventBus::with_capacity(config.bus.capacity);
        info!("  [bus] capacity={}", config.bus.capacity);

        let registry = Arc::new(PendingRequestRegistry::new());
        let queue = Arc::new(OutboundRequestQueue::new());
        let remote = Arc::new(LoopbackRemote::new(bus.clone()));
        info!("  [1] Pending registry initialized");
        info!("  [3] Outbound queue initialized");

        let refresher = Arc::new(LocalCredentialRefresher::default());
        let tokens = Arc::new(InMemoryTokenStore::new());
        let ports = SupervisorPorts {
            downloader: downloader.clone(),
            cache: Arc::new(InMemoryConfigCache::new()),
            refresher: refresher.clone(),
            tokens: tokens.clone(),
            session_reset: Arc::new(NoopSessionReset),
        };
        let supervisor = Arc::new(ConnectionSupervisor::new(
            config.supervisor.clone(),
            registry.clone(),
            queue.clone(),
            remote.clone(),
            bus.clone(),
            ports,
        ));
        info!(
            "  [4] Connection supervisor initialized (max_attempts={})",
            config.supervisor.max_bootstrap_attempts
        );

        let requesters = RequesterContext::new(registry.clone(), bus.clone(), remote.clone(), queue.clone())
            .with_readiness(supervisor.subscribe_state());
        info!("  [2] Requester context initialized");

        Self {
            bus,
            registry,
            queue,
            remote,
            supervisor,
            downloader,
            refresher,
            tokens,
            requesters,
            config,
        }
    }
}
