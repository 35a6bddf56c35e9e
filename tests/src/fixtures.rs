//! # Test Fixtures
//!
//! Mock collaborators and a harness wiring the four subsystems together
//! without the client runtime.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;

use pl_01_pending_registry::PendingRequestRegistry;
use pl_02_requester::RequesterContext;
use pl_03_outbound_queue::OutboundRequestQueue;
use pl_04_connection_supervisor::{
    AuthError, BootstrapBundle, BootstrapError, ConfigDownloader, ConnectionSupervisor,
    CredentialRefresher, InMemoryConfigCache, InMemoryTokenStore, NoopSessionReset,
    SupervisorConfig, SupervisorPorts,
};
use shared_bus::{ConnectionEvent, EventPublisher, InMemoryEventBus};
use shared_types::{
    AssetBundle, ChannelId, ChatMessage, Credential, MessageId, OutboundRequest, PinnedMessage,
    ReactionTally, RemoteConfig, RemoteService, RequestBody, ResponseEnvelope, ResponsePayload,
    TransportError,
};

// =============================================================================
// VALUES
// =============================================================================

pub fn remote_config(version: u64) -> RemoteConfig {
    RemoteConfig {
        version,
        endpoint: "wss://chat.test/socket".to_string(),
        app_id: "parley-tests".to_string(),
    }
}

pub fn message(channel: &str, id: &str, secs: i64) -> ChatMessage {
    ChatMessage {
        id: MessageId::from(id),
        channel: ChannelId::from(channel),
        sender: "tester".to_string(),
        body: format!("body of {id}"),
        sent_at: Utc.timestamp_opt(secs, 0).unwrap(),
    }
}

/// The success envelope a well-behaved server would push for `request`.
pub fn answer(request: &OutboundRequest) -> ResponseEnvelope {
    let payload = match &request.body {
        RequestBody::FetchHistory { channel, .. } => ResponsePayload::History {
            channel: channel.clone(),
            messages: vec![
                message(&channel.0, "late", 200),
                message(&channel.0, "early", 100),
            ],
        },
        RequestBody::CountReactions {
            channel,
            message_ids,
        } => ResponsePayload::ReactionCounts {
            channel: channel.clone(),
            tallies: message_ids
                .iter()
                .map(|id| ReactionTally {
                    message_id: id.clone(),
                    emoji: ":+1:".to_string(),
                    count: 1,
                })
                .collect(),
        },
        RequestBody::Pin {
            channel,
            message_id,
        } => ResponsePayload::Pinned(PinnedMessage {
            channel: channel.clone(),
            message_id: message_id.clone(),
            pinned_at: Utc.timestamp_opt(1_000, 0).unwrap(),
        }),
        RequestBody::Unpin {
            channel,
            message_id,
        } => ResponsePayload::Unpinned {
            channel: channel.clone(),
            message_id: message_id.clone(),
        },
    };
    ResponseEnvelope::for_key(&request.key, payload)
}

// =============================================================================
// REMOTE SERVICE
// =============================================================================

/// How [`MockRemote`] reacts to `send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Publish the matching answer immediately.
    Echo,
    /// Record only; the test publishes answers itself.
    Hold,
}

/// Recording `RemoteService`.
pub struct MockRemote {
    bus: InMemoryEventBus,
    reply: Mutex<Reply>,
    /// Publish Connecting/SocketOpen/Authenticated from `connect()`.
    emit_lifecycle: bool,
    pub sent: Mutex<Vec<OutboundRequest>>,
    pub connects: AtomicU32,
    pub disconnects: AtomicU32,
    pub logouts: AtomicU32,
    sent_signal: Notify,
}

impl MockRemote {
    pub fn new(bus: InMemoryEventBus, reply: Reply, emit_lifecycle: bool) -> Self {
        Self {
            bus,
            reply: Mutex::new(reply),
            emit_lifecycle,
            sent: Mutex::new(Vec::new()),
            connects: AtomicU32::new(0),
            disconnects: AtomicU32::new(0),
            logouts: AtomicU32::new(0),
            sent_signal: Notify::new(),
        }
    }

    pub fn set_reply(&self, reply: Reply) {
        *self.reply.lock() = reply;
    }

    pub fn sent(&self) -> Vec<OutboundRequest> {
        self.sent.lock().clone()
    }

    /// Wait until at least `count` requests were sent.
    pub async fn wait_for_sent(&self, count: usize) -> Vec<OutboundRequest> {
        loop {
            let notified = self.sent_signal.notified();
            {
                let sent = self.sent.lock();
                if sent.len() >= count {
                    return sent.clone();
                }
            }
            notified.await;
        }
    }
}

#[async_trait]
impl RemoteService for MockRemote {
    async fn connect(&self, _config: &RemoteConfig) -> Result<(), TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.emit_lifecycle {
            self.bus.publish_lifecycle(ConnectionEvent::Connecting).await;
            self.bus.publish_lifecycle(ConnectionEvent::SocketOpen).await;
            self.bus.publish_lifecycle(ConnectionEvent::Authenticated).await;
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&self, request: OutboundRequest) -> Result<(), TransportError> {
        self.sent.lock().push(request.clone());
        self.sent_signal.notify_waiters();
        if *self.reply.lock() == Reply::Echo {
            self.bus.publish_response(answer(&request)).await;
        }
        Ok(())
    }

    async fn logout(&self) -> Result<(), TransportError> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// SUPERVISOR COLLABORATORS
// =============================================================================

/// Download collaborator that fails a scripted number of times.
pub struct ScriptedDownloader {
    failures_left: AtomicU32,
    always_fail: bool,
    calls: AtomicU32,
    config: Mutex<RemoteConfig>,
}

impl ScriptedDownloader {
    /// Fails the first `failures` calls, then succeeds.
    pub fn failing_first(failures: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(failures),
            always_fail: false,
            calls: AtomicU32::new(0),
            config: Mutex::new(remote_config(1)),
        }
    }

    pub fn always_failing() -> Self {
        Self {
            always_fail: true,
            ..Self::failing_first(0)
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Serve a different configuration from now on.
    pub fn serve(&self, config: RemoteConfig) {
        *self.config.lock() = config;
    }
}

#[async_trait]
impl ConfigDownloader for ScriptedDownloader {
    async fn download(&self) -> Result<BootstrapBundle, BootstrapError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted_failure = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if self.always_fail || scripted_failure {
            return Err(BootstrapError::Download("scripted failure".to_string()));
        }
        Ok(BootstrapBundle {
            config: self.config.lock().clone(),
            assets: AssetBundle {
                version: "assets-test".to_string(),
                size_bytes: 1024,
            },
        })
    }

    async fn fetch_config(&self) -> Result<RemoteConfig, BootstrapError> {
        Ok(self.config.lock().clone())
    }
}

/// Scripted refresh results, consumed front first. Empty means success.
#[derive(Debug, Clone)]
pub enum RefreshStep {
    Succeed,
    Revoke,
    Fail,
}

/// Refresh collaborator with an optional gate to hold a refresh open.
pub struct ScriptedRefresher {
    steps: Mutex<VecDeque<RefreshStep>>,
    calls: AtomicU32,
    gate: Option<Arc<Notify>>,
    /// Signalled when a refresh starts.
    pub entered: Arc<Notify>,
}

impl ScriptedRefresher {
    pub fn new(steps: Vec<RefreshStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            calls: AtomicU32::new(0),
            gate: None,
            entered: Arc::new(Notify::new()),
        }
    }

    /// Every refresh waits for `gate` before answering.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialRefresher for ScriptedRefresher {
    async fn refresh(&self) -> Result<Credential, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let step = self.steps.lock().pop_front().unwrap_or(RefreshStep::Succeed);
        match step {
            RefreshStep::Succeed => Ok(Credential {
                access_token: "fresh-token".to_string(),
                expires_at: Utc::now() + chrono::Duration::hours(1),
            }),
            RefreshStep::Revoke => Err(AuthError::Revoked),
            RefreshStep::Fail => Err(AuthError::Transient("refresh endpoint down".to_string())),
        }
    }
}

// =============================================================================
// HARNESS
// =============================================================================

/// Options for [`Harness::new`].
pub struct HarnessOptions {
    pub supervisor: SupervisorConfig,
    pub reply: Reply,
    pub emit_lifecycle: bool,
    pub downloader: ScriptedDownloader,
    pub refresher: ScriptedRefresher,
    pub cached_config: Option<RemoteConfig>,
    /// Give the requester context the supervisor's readiness probe.
    pub readiness: bool,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            supervisor: SupervisorConfig {
                bootstrap_retry_delay: Duration::from_millis(10),
                ..SupervisorConfig::default()
            },
            reply: Reply::Echo,
            emit_lifecycle: false,
            downloader: ScriptedDownloader::failing_first(0),
            refresher: ScriptedRefresher::new(Vec::new()),
            cached_config: None,
            readiness: true,
        }
    }
}

/// All four subsystems over one bus.
pub struct Harness {
    pub bus: InMemoryEventBus,
    pub registry: Arc<PendingRequestRegistry>,
    pub queue: Arc<OutboundRequestQueue>,
    pub remote: Arc<MockRemote>,
    pub downloader: Arc<ScriptedDownloader>,
    pub refresher: Arc<ScriptedRefresher>,
    pub tokens: Arc<InMemoryTokenStore>,
    pub cache: Arc<InMemoryConfigCache>,
    pub supervisor: Arc<ConnectionSupervisor>,
    pub ctx: RequesterContext,
}

impl Harness {
    pub fn new(options: HarnessOptions) -> Self {
        let bus = InMemoryEventBus::new();
        let registry = Arc::new(PendingRequestRegistry::new());
        let queue = Arc::new(OutboundRequestQueue::new());
        let remote = Arc::new(MockRemote::new(bus.clone(), options.reply, options.emit_lifecycle));
        let downloader = Arc::new(options.downloader);
        let refresher = Arc::new(options.refresher);
        let tokens = Arc::new(InMemoryTokenStore::new());
        let cache = Arc::new(match options.cached_config {
            Some(config) => InMemoryConfigCache::with_config(config),
            None => InMemoryConfigCache::new(),
        });

        let supervisor = Arc::new(ConnectionSupervisor::new(
            options.supervisor,
            registry.clone(),
            queue.clone(),
            remote.clone(),
            bus.clone(),
            SupervisorPorts {
                downloader: downloader.clone(),
                cache: cache.clone(),
                refresher: refresher.clone(),
                tokens: tokens.clone(),
                session_reset: Arc::new(NoopSessionReset),
            },
        ));

        let mut ctx = RequesterContext::new(registry.clone(), bus.clone(), remote.clone(), queue.clone());
        if options.readiness {
            ctx = ctx.with_readiness(supervisor.subscribe_state());
        }

        Self {
            bus,
            registry,
            queue,
            remote,
            downloader,
            refresher,
            tokens,
            cache,
            supervisor,
            ctx,
        }
    }

    /// Feed lifecycle events straight into the supervisor.
    pub async fn drive(&self, events: &[ConnectionEvent]) {
        for event in events {
            self.supervisor.handle_lifecycle(event).await;
        }
    }

    /// Uninitialized → Connecting → AsyncReady → ChatReady.
    pub async fn connect_ready(&self) {
        self.drive(&[
            ConnectionEvent::Connecting,
            ConnectionEvent::SocketOpen,
            ConnectionEvent::Authenticated,
        ])
        .await;
    }
}
