//! Connection supervisor service.
//!
//! Owns the one `ConnectionState` of the client. All mutation of that state,
//! and every session-wide purge of the registry and queue, goes through this
//! type. `run()` is the serialized context: it handles lifecycle events,
//! error envelopes and [`SupervisorCommand`]s one at a time. Callers that
//! run alongside the loop ask for a bootstrap through the command channel
//! rather than calling `bootstrap()` themselves.

use crate::domain::{next, AuthOutcome, Effect, SupervisorConfig};
use crate::error::{AuthError, BootstrapError};
use crate::ports::{
    BootstrapBundle, ConfigCache, ConfigDownloader, CredentialRefresher, SessionResetHook,
    TokenStore,
};
use parking_lot::RwLock;
use pl_01_pending_registry::PendingRequestRegistry;
use pl_03_outbound_queue::OutboundRequestQueue;
use shared_bus::{ConnectionEvent, InMemoryEventBus, Subscription};
use shared_types::{ConnectionState, ErrorEnvelope, RemoteConfig, RemoteService};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

/// Work handed to the run loop from outside it.
#[derive(Debug)]
pub enum SupervisorCommand {
    /// Connect from cached configuration or download it. The outcome is
    /// sent on `reply` when one is given.
    Bootstrap {
        reply: Option<oneshot::Sender<Result<(), BootstrapError>>>,
    },
    /// The network became reachable.
    NetworkAvailable,
}

impl SupervisorCommand {
    /// A bootstrap command plus the receiver for its outcome.
    pub fn bootstrap() -> (Self, oneshot::Receiver<Result<(), BootstrapError>>) {
        let (tx, rx) = oneshot::channel();
        (Self::Bootstrap { reply: Some(tx) }, rx)
    }
}

/// Collaborators the supervisor calls out to.
#[derive(Clone)]
pub struct SupervisorPorts {
    pub downloader: Arc<dyn ConfigDownloader>,
    pub cache: Arc<dyn ConfigCache>,
    pub refresher: Arc<dyn CredentialRefresher>,
    pub tokens: Arc<dyn TokenStore>,
    pub session_reset: Arc<dyn SessionResetHook>,
}

/// Bus subscriptions consumed by `run()`.
///
/// Taken with [`ConnectionSupervisor::attach`] before the transport starts
/// publishing, so no event is missed.
pub struct SupervisorEvents {
    lifecycle: Subscription<ConnectionEvent>,
    errors: Subscription<ErrorEnvelope>,
}

/// Statistics for the connection supervisor
#[derive(Debug, Default)]
pub struct SupervisorStats {
    pub transitions: AtomicU64,
    pub bootstrap_attempts: AtomicU64,
    pub bootstrap_failures: AtomicU64,
    pub refresh_successes: AtomicU64,
    pub refresh_failures: AtomicU64,
    pub logouts: AtomicU64,
    pub config_updates: AtomicU64,
}

/// Point-in-time copy of [`SupervisorStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorSnapshot {
    pub state: ConnectionState,
    pub transitions: u64,
    pub bootstrap_attempts: u64,
    pub bootstrap_failures: u64,
    pub refresh_successes: u64,
    pub refresh_failures: u64,
    pub logouts: u64,
    pub config_updates: u64,
}

/// Clears its flag on drop. Acquired with a compare-exchange.
struct FlagGuard<'a>(&'a AtomicBool);

impl<'a> FlagGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Connection state machine, bootstrap and credential refresh.
pub struct ConnectionSupervisor {
    config: SupervisorConfig,
    state: watch::Sender<ConnectionState>,
    registry: Arc<PendingRequestRegistry>,
    queue: Arc<OutboundRequestQueue>,
    remote: Arc<dyn RemoteService>,
    bus: InMemoryEventBus,
    ports: SupervisorPorts,
    active_config: RwLock<Option<RemoteConfig>>,
    downloading: AtomicBool,
    refreshing: AtomicBool,
    stats: SupervisorStats,
}

impl ConnectionSupervisor {
    pub fn new(
        config: SupervisorConfig,
        registry: Arc<PendingRequestRegistry>,
        queue: Arc<OutboundRequestQueue>,
        remote: Arc<dyn RemoteService>,
        bus: InMemoryEventBus,
        ports: SupervisorPorts,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Uninitialized);
        Self {
            config,
            state,
            registry,
            queue,
            remote,
            bus,
            ports,
            active_config: RwLock::new(None),
            downloading: AtomicBool::new(false),
            refreshing: AtomicBool::new(false),
            stats: SupervisorStats::default(),
        }
    }

    // =========================================================================
    // STATE
    // =========================================================================

    /// Current connection state.
    pub fn current_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Read-only observable of the connection state.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Configuration the last connect attempt used.
    pub fn active_config(&self) -> Option<RemoteConfig> {
        self.active_config.read().clone()
    }

    pub fn is_downloading(&self) -> bool {
        self.downloading.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> &SupervisorStats {
        &self.stats
    }

    pub fn snapshot(&self) -> SupervisorSnapshot {
        SupervisorSnapshot {
            state: self.current_state(),
            transitions: self.stats.transitions.load(Ordering::Relaxed),
            bootstrap_attempts: self.stats.bootstrap_attempts.load(Ordering::Relaxed),
            bootstrap_failures: self.stats.bootstrap_failures.load(Ordering::Relaxed),
            refresh_successes: self.stats.refresh_successes.load(Ordering::Relaxed),
            refresh_failures: self.stats.refresh_failures.load(Ordering::Relaxed),
            logouts: self.stats.logouts.load(Ordering::Relaxed),
            config_updates: self.stats.config_updates.load(Ordering::Relaxed),
        }
    }

    fn set_state(&self, to: ConnectionState) {
        let from = self.state.send_replace(to);
        if from != to {
            self.stats.transitions.fetch_add(1, Ordering::Relaxed);
            info!(from = %from, to = %to, "Connection state changed");
        }
    }

    // =========================================================================
    // BOOTSTRAP
    // =========================================================================

    /// Start the client: connect from cached configuration, or download it.
    pub async fn bootstrap(&self) -> Result<(), BootstrapError> {
        if let Some(config) = self.ports.cache.load() {
            info!(version = config.version, "Bootstrapping from cached config");
            self.apply_and_connect(config).await;
            return Ok(());
        }
        self.dl_reload().await
    }

    /// Download configuration and assets with bounded retry, then connect.
    ///
    /// Fails with `AlreadyInProgress` if another download is running, and
    /// with `Exhausted` once every attempt has failed.
    pub async fn dl_reload(&self) -> Result<(), BootstrapError> {
        let Some(_guard) = FlagGuard::acquire(&self.downloading) else {
            debug!("Bootstrap download already running");
            return Err(BootstrapError::AlreadyInProgress);
        };

        match self.download_with_retry().await {
            Ok(bundle) => {
                info!(
                    version = bundle.config.version,
                    assets = %bundle.assets.version,
                    "Bootstrap download complete"
                );
                self.ports.cache.store(&bundle.config);
                self.apply_and_connect(bundle.config).await;
                Ok(())
            }
            Err(e) => {
                self.stats.bootstrap_failures.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "Bootstrap failed");
                Err(e)
            }
        }
    }

    async fn download_with_retry(&self) -> Result<BootstrapBundle, BootstrapError> {
        let max = self.config.max_bootstrap_attempts;
        let mut last_error = String::new();

        for attempt in 1..=max {
            self.stats.bootstrap_attempts.fetch_add(1, Ordering::Relaxed);
            match self.ports.downloader.download().await {
                Ok(bundle) => return Ok(bundle),
                Err(e) => {
                    warn!(attempt = attempt, max = max, error = %e, "Bootstrap download failed");
                    last_error = e.to_string();
                    if attempt < max {
                        tokio::time::sleep(self.config.bootstrap_retry_delay).await;
                    }
                }
            }
        }

        Err(BootstrapError::Exhausted {
            attempts: max,
            last_error,
        })
    }

    /// React to the network becoming reachable.
    ///
    /// Runs the download flow only if nothing is cached, no download is
    /// running and the client never got past `Uninitialized`. Returns
    /// whether a download ran.
    pub async fn on_network_available(&self) -> Result<bool, BootstrapError> {
        if self.is_downloading()
            || self.ports.cache.load().is_some()
            || self.current_state() != ConnectionState::Uninitialized
        {
            debug!(state = %self.current_state(), "Network available; bootstrap not needed");
            return Ok(false);
        }
        info!("Network available; retrying bootstrap");
        self.dl_reload().await.map(|()| true)
    }

    async fn apply_and_connect(&self, config: RemoteConfig) {
        *self.active_config.write() = Some(config.clone());
        self.set_state(ConnectionState::Connecting);
        if let Err(e) = self.remote.connect(&config).await {
            warn!(endpoint = %config.endpoint, error = %e, "Connect attempt failed");
            self.set_state(ConnectionState::Closed);
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Apply one transport lifecycle event.
    pub async fn handle_lifecycle(&self, event: &ConnectionEvent) {
        let from = self.current_state();
        let Some(transition) = next(from, event) else {
            debug!(state = %from, event = ?event, "Lifecycle event ignored");
            return;
        };

        match transition.effect {
            Effect::None => self.set_state(transition.to),
            Effect::ResetSession => {
                // Purge before publishing the new state so nothing registered
                // under ChatReady is swept.
                self.reset_session("chat ready");
                self.set_state(transition.to);
            }
            Effect::RecheckConfig => {
                if let ConnectionEvent::Closed {
                    reason: Some(reason),
                } = event
                {
                    info!(reason = %reason, "Connection closed");
                }
                self.set_state(transition.to);
                if self.config.recheck_config_on_close {
                    self.recheck_config().await;
                }
            }
        }
    }

    fn reset_session(&self, cause: &str) {
        let cleared = self.registry.clear();
        let cancelled = self.queue.cancel_all();
        info!(
            cause = cause,
            cleared = cleared,
            cancelled = cancelled,
            "Voided in-flight requests"
        );
    }

    async fn recheck_config(&self) {
        let config = match self.ports.downloader.fetch_config().await {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Config re-check failed");
                return;
            }
        };

        let cached = self.ports.cache.load().map(|c| c.version);
        if cached == Some(config.version) {
            debug!(version = config.version, "Remote config unchanged");
            return;
        }

        info!(old = ?cached, new = config.version, "Remote config changed");
        self.ports.cache.store(&config);
        *self.active_config.write() = Some(config);
        self.stats.config_updates.fetch_add(1, Ordering::Relaxed);
    }

    // =========================================================================
    // AUTHENTICATION
    // =========================================================================

    /// React to a broadcast error envelope. Only credential rejections are
    /// handled here.
    pub async fn handle_error(&self, envelope: &ErrorEnvelope) -> Option<AuthOutcome> {
        if !envelope.is_unauthorized() {
            return None;
        }
        Some(self.on_unauthorized().await)
    }

    /// Credential rejected: void in-flight work, then refresh.
    pub async fn on_unauthorized(&self) -> AuthOutcome {
        self.reset_session("credential rejected");

        let Some(_guard) = FlagGuard::acquire(&self.refreshing) else {
            debug!("Credential refresh already running");
            return AuthOutcome::AlreadyRefreshing;
        };

        let was_connected = self.current_state().is_connected();
        match self.ports.refresher.refresh().await {
            Ok(credential) => {
                self.ports.tokens.store(&credential);
                self.stats.refresh_successes.fetch_add(1, Ordering::Relaxed);
                if was_connected {
                    self.set_state(ConnectionState::ChatReady);
                    let report = self.queue.flush_all(self.remote.as_ref()).await;
                    if report.total() > 0 {
                        debug!(sent = report.sent.len(), "Flushed requests queued during refresh");
                    }
                } else {
                    self.reconnect().await;
                }
                info!(state = %self.current_state(), "Credential refreshed");
                AuthOutcome::Refreshed(self.current_state())
            }
            Err(AuthError::Revoked) => {
                self.stats.refresh_failures.fetch_add(1, Ordering::Relaxed);
                error!("Credential revoked; logging out");
                self.logout().await;
                AuthOutcome::LoggedOut
            }
            Err(e) => {
                self.stats.refresh_failures.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Credential refresh failed; will retry on next rejection");
                AuthOutcome::Transient
            }
        }
    }

    async fn reconnect(&self) {
        let config = self.active_config().or_else(|| self.ports.cache.load());
        match config {
            Some(config) => self.apply_and_connect(config).await,
            None => {
                warn!("No remote config to reconnect with");
                self.set_state(ConnectionState::Connecting);
            }
        }
    }

    /// Full logout: drop the credential, close the remote session and reset
    /// every dependent container.
    pub async fn logout(&self) {
        self.ports.tokens.clear();
        if let Err(e) = self.remote.logout().await {
            warn!(error = %e, "Remote logout failed");
        }
        if let Err(e) = self.remote.disconnect().await {
            warn!(error = %e, "Disconnect failed");
        }
        self.ports.session_reset.reset();
        self.reset_session("logout");
        self.set_state(ConnectionState::Uninitialized);
        self.stats.logouts.fetch_add(1, Ordering::Relaxed);
    }

    // =========================================================================
    // RUN LOOP
    // =========================================================================

    /// Subscribe to the lifecycle and error channels.
    pub fn attach(&self) -> SupervisorEvents {
        SupervisorEvents {
            lifecycle: self.bus.subscribe_lifecycle(),
            errors: self.bus.subscribe_errors(),
        }
    }

    /// Serialized event loop. Returns on shutdown or when the bus closes.
    ///
    /// A closed command channel is not fatal; the loop keeps following the
    /// bus.
    pub async fn run(
        &self,
        mut events: SupervisorEvents,
        mut commands: mpsc::Receiver<SupervisorCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("Connection supervisor running");
        let mut commands_open = true;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("Connection supervisor shutting down");
                    break;
                }
                event = events.lifecycle.recv() => match event {
                    Some(event) => self.handle_lifecycle(&event).await,
                    None => break,
                },
                envelope = events.errors.recv() => match envelope {
                    Some(envelope) => {
                        self.handle_error(&envelope).await;
                    }
                    None => break,
                },
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.handle_command(command).await,
                    None => commands_open = false,
                },
            }
        }
    }

    async fn handle_command(&self, command: SupervisorCommand) {
        match command {
            SupervisorCommand::Bootstrap { reply } => {
                let result = self.bootstrap().await;
                if let Some(reply) = reply {
                    // The requester may have stopped waiting.
                    let _ = reply.send(result);
                }
            }
            SupervisorCommand::NetworkAvailable => {
                if let Err(e) = self.on_network_available().await {
                    debug!(error = %e, "Network-triggered bootstrap did not complete");
                }
            }
        }
    }
}
