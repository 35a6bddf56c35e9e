//! # Client Runtime
//!
//! Starts the supervisor loop and background handlers, bootstraps the
//! connection and tears everything down on shutdown.
//!
//! ## Startup Sequence
//!
//! 1. Attach the supervisor to the bus (before anything publishes)
//! 2. Spawn the supervisor run loop and background handlers
//! 3. Ask the run loop to bootstrap: connect from cache or download
//!    configuration
//! 4. Callers wait for `ChatReady` with [`ClientRuntime::wait_until_ready`]
//!
//! Every supervisor state change happens inside its run loop. The runtime
//! only sends it [`SupervisorCommand`]s.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use pl_02_requester::{RequestKind, Requester};
use pl_04_connection_supervisor::{BootstrapError, SupervisorCommand};
use shared_types::{ConnectionState, RemoteService};

use crate::container::{ClientConfig, ClientContainer};
use crate::handlers::{run_registry_sweep, ErrorReporter, MetricsSampler};

/// Commands buffered before the supervisor drains them.
const SUPERVISOR_COMMAND_CAPACITY: usize = 8;

/// The client runtime orchestrating all subsystems.
pub struct ClientRuntime {
    /// Subsystem container with all initialized services.
    container: Arc<ClientContainer>,
    /// Shutdown signal sender.
    shutdown_tx: watch::Sender<bool>,
    /// Shutdown signal receiver.
    shutdown_rx: watch::Receiver<bool>,
    /// Commands for the supervisor run loop.
    commands_tx: mpsc::Sender<SupervisorCommand>,
    commands_rx: Mutex<Option<mpsc::Receiver<SupervisorCommand>>>,
    /// Spawned background tasks.
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ClientRuntime {
    /// Create a runtime with a fresh container.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_container(ClientContainer::new(config))
    }

    pub fn with_container(container: ClientContainer) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (commands_tx, commands_rx) = mpsc::channel(SUPERVISOR_COMMAND_CAPACITY);
        Self {
            container: Arc::new(container),
            shutdown_tx,
            shutdown_rx,
            commands_tx,
            commands_rx: Mutex::new(Some(commands_rx)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Start background tasks and bootstrap the connection.
    ///
    /// An exhausted bootstrap is not fatal: the supervisor retries on the
    /// next network-available signal.
    pub async fn start(&self) -> Result<()> {
        let Some(commands_rx) = self.commands_rx.lock().take() else {
            bail!("client runtime already started");
        };
        info!("===========================================");
        info!("  Parley Client Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        self.spawn_supervisor(commands_rx);
        self.spawn_handlers();

        let (command, outcome) = SupervisorCommand::bootstrap();
        self.commands_tx
            .send(command)
            .await
            .context("supervisor stopped before bootstrap")?;
        match outcome.await.context("supervisor dropped bootstrap request")? {
            Ok(()) => info!("Bootstrap complete"),
            Err(e @ BootstrapError::Exhausted { .. }) => {
                warn!(error = %e, "Bootstrap exhausted; waiting for network");
            }
            Err(e) => return Err(e).context("bootstrap failed"),
        }
        Ok(())
    }

    fn spawn_supervisor(&self, commands_rx: mpsc::Receiver<SupervisorCommand>) {
        let supervisor = Arc::clone(&self.container.supervisor);
        let events = supervisor.attach();
        let shutdown = self.shutdown_rx.clone();
        self.track(tokio::spawn(async move {
            supervisor.run(events, commands_rx, shutdown).await;
        }));
    }

    fn spawn_handlers(&self) {
        let container = &self.container;

        let reporter = ErrorReporter::new(container.bus.error_stream());
        let shutdown = self.shutdown_rx.clone();
        self.track(tokio::spawn(async move {
            reporter.run(shutdown).await;
        }));

        if container.config.telemetry.metrics_enabled {
            let sampler = MetricsSampler::new(
                Arc::clone(&container.registry),
                Arc::clone(&container.queue),
                Arc::clone(&container.supervisor),
                container.requesters.clone(),
            );
            let interval = container.config.runtime.metrics_interval;
            let shutdown = self.shutdown_rx.clone();
            self.track(tokio::spawn(sampler.run(interval, shutdown)));
        }

        if let Some(ttl) = container.config.runtime.pending_ttl {
            let registry = Arc::clone(&container.registry);
            let shutdown = self.shutdown_rx.clone();
            self.track(tokio::spawn(async move {
                run_registry_sweep(registry, ttl, shutdown).await;
            }));
        }

        info!("Background handlers started");
    }

    fn track(&self, handle: JoinHandle<()>) {
        self.tasks.lock().push(handle);
    }

    /// Tell the supervisor the network is reachable again.
    pub fn notify_network_available(&self) {
        if let Err(e) = self.commands_tx.try_send(SupervisorCommand::NetworkAvailable) {
            warn!(error = %e, "Network signal dropped");
        }
    }

    /// Wait until the connection is `ChatReady`.
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<()> {
        let mut state = self.container.supervisor.subscribe_state();
        tokio::time::timeout(timeout, state.wait_for(ConnectionState::is_connected))
            .await
            .context("timed out waiting for chat ready")?
            .context("supervisor dropped")?;
        Ok(())
    }

    /// Requester for one kind.
    pub fn requester<K: RequestKind>(&self) -> Requester<K> {
        self.container.requesters.requester::<K>()
    }

    /// Get a reference to the subsystem container.
    pub fn container(&self) -> Arc<ClientContainer> {
        Arc::clone(&self.container)
    }

    /// Shutdown gracefully.
    ///
    /// ## Shutdown Sequence
    ///
    /// 1. Signal shutdown to all tasks
    /// 2. Close the transport
    /// 3. Wait for tasks (bounded)
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        if let Err(e) = self.container.remote.disconnect().await {
            warn!(error = %e, "Disconnect during shutdown failed");
        }

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        let joined = tokio::time::timeout(
            Duration::from_secs(2),
            futures::future::join_all(tasks),
        )
        .await;
        if joined.is_err() {
            warn!("Background tasks did not stop in time");
        }

        info!("Shutdown complete");
    }
}
