//! # Session Lifecycle Choreography
//!
//! Connection supervisor driving the registry and the outbound queue.
//!
//! ```text
//! Authenticated ──→ Supervisor ──clear──→ Registry
//!                       │      ──cancel─→ Queue
//! Unauthorized  ──→ refresh ──→ ChatReady: flush Queue
//!                           └─→ Revoked:   logout, Uninitialized
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Notify};

use pl_02_requester::{PinMessage, PinTarget, RequesterError};
use pl_04_connection_supervisor::{
    AuthOutcome, BootstrapError, ConfigCache, SupervisorCommand, SupervisorConfig,
};
use shared_bus::{ConnectionEvent, EventPublisher, EventTopic};
use shared_types::{
    ChannelId, ConnectionState, CorrelationKey, ErrorCode, ErrorEnvelope, MessageId,
    OutboundRequest, RequestBody,
};

use crate::fixtures::{
    remote_config, Harness, HarnessOptions, RefreshStep, ScriptedDownloader, ScriptedRefresher,
};

fn pin_body(id: &str) -> RequestBody {
    RequestBody::Pin {
        channel: ChannelId::from("general"),
        message_id: MessageId::from(id),
    }
}

fn target(id: &str) -> PinTarget {
    PinTarget {
        channel: ChannelId::from("general"),
        message_id: MessageId::from(id),
    }
}

async fn wait_for_queue(h: &Harness, len: usize) {
    while h.queue.len() < len {
        tokio::task::yield_now().await;
    }
}

// =============================================================================
// CHAT READY PURGE
// =============================================================================

#[tokio::test]
async fn test_chat_ready_voids_requests_queued_while_offline() {
    let h = Harness::new(HarnessOptions::default());
    let requester = h.ctx.requester::<PinMessage>();
    let handle = tokio::spawn(async move { requester.send(target("m1"), true).await });

    wait_for_queue(&h, 1).await;
    assert_eq!(h.registry.len(), 1);

    h.connect_ready().await;

    assert_eq!(h.supervisor.current_state(), ConnectionState::ChatReady);
    assert!(h.registry.is_empty());
    assert!(h.queue.is_empty());
    let queue = h.queue.snapshot();
    assert_eq!(queue.total_cancelled + queue.total_withdrawn, 1);
    assert_eq!(h.registry.snapshot().total_cleared, 1);

    // The caller learns its request was voided and lets go of the bus.
    let err = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, RequesterError::Purged));
    assert_eq!(h.bus.subscription_count(EventTopic::Pins), 0);
    assert_eq!(h.bus.subscription_count(EventTopic::Errors), 0);
    assert_eq!(h.ctx.in_flight(), 0);

    h.queue.flush_all(h.remote.as_ref()).await;
    assert!(h.remote.sent().is_empty());
}

#[tokio::test]
async fn test_requests_after_chat_ready_dispatch_immediately() {
    let h = Harness::new(HarnessOptions::default());
    h.connect_ready().await;

    let pinned = h
        .ctx
        .requester::<PinMessage>()
        .send(target("m1"), true)
        .await
        .unwrap();

    assert_eq!(pinned.message_id, MessageId::from("m1"));
    assert!(h.queue.is_empty());
    assert_eq!(h.ctx.stats().snapshot().dispatched, 1);
}

// =============================================================================
// CREDENTIAL REFRESH
// =============================================================================

#[tokio::test]
async fn test_refresh_while_connected_flushes_requests_queued_during_refresh() {
    let gate = Arc::new(Notify::new());
    let h = Harness::new(HarnessOptions {
        refresher: ScriptedRefresher::new(Vec::new()).gated(gate.clone()),
        readiness: false,
        ..HarnessOptions::default()
    });
    h.connect_ready().await;

    let supervisor = h.supervisor.clone();
    let refresh = tokio::spawn(async move { supervisor.on_unauthorized().await });
    h.refresher.entered.notified().await;

    let requester = h.ctx.requester::<PinMessage>();
    let pending = tokio::spawn(async move { requester.send(target("m7"), true).await });
    wait_for_queue(&h, 1).await;
    assert!(h.remote.sent().is_empty());

    gate.notify_one();

    assert_eq!(
        refresh.await.unwrap(),
        AuthOutcome::Refreshed(ConnectionState::ChatReady)
    );
    let pinned = pending.await.unwrap().unwrap();
    assert_eq!(pinned.message_id, MessageId::from("m7"));
    assert!(h.queue.is_empty());
    assert_eq!(h.queue.snapshot().total_flushed, 1);
    assert!(h.tokens.current().is_some());
}

#[tokio::test]
async fn test_concurrent_rejections_refresh_once() {
    let gate = Arc::new(Notify::new());
    let h = Harness::new(HarnessOptions {
        refresher: ScriptedRefresher::new(Vec::new()).gated(gate.clone()),
        ..HarnessOptions::default()
    });
    h.connect_ready().await;

    let supervisor = h.supervisor.clone();
    let first = tokio::spawn(async move { supervisor.on_unauthorized().await });
    h.refresher.entered.notified().await;

    assert_eq!(h.supervisor.on_unauthorized().await, AuthOutcome::AlreadyRefreshing);

    gate.notify_one();
    assert!(matches!(first.await.unwrap(), AuthOutcome::Refreshed(_)));
    assert_eq!(h.refresher.calls(), 1);
}

#[tokio::test]
async fn test_rejection_while_connecting_reconnects() {
    let h = Harness::new(HarnessOptions {
        cached_config: Some(remote_config(1)),
        ..HarnessOptions::default()
    });
    h.supervisor.bootstrap().await.unwrap();
    assert_eq!(h.supervisor.current_state(), ConnectionState::Connecting);
    assert_eq!(h.remote.connects.load(std::sync::atomic::Ordering::SeqCst), 1);

    let outcome = h.supervisor.on_unauthorized().await;

    assert_eq!(outcome, AuthOutcome::Refreshed(ConnectionState::Connecting));
    assert_eq!(h.remote.connects.load(std::sync::atomic::Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_revoked_credential_logs_out_and_purges() {
    let h = Harness::new(HarnessOptions {
        refresher: ScriptedRefresher::new(vec![RefreshStep::Revoke]),
        ..HarnessOptions::default()
    });
    h.connect_ready().await;
    h.registry
        .register(CorrelationKey::generate("pin"), pin_body("m1"))
        .unwrap();
    h.queue
        .enqueue(OutboundRequest::new(CorrelationKey::generate("pin"), pin_body("m2")));

    let outcome = h
        .supervisor
        .handle_error(&ErrorEnvelope::session(ErrorCode::Unauthorized, "token expired"))
        .await;

    assert_eq!(outcome, Some(AuthOutcome::LoggedOut));
    assert_eq!(h.supervisor.current_state(), ConnectionState::Uninitialized);
    assert!(h.tokens.current().is_none());
    assert!(h.registry.is_empty());
    assert!(h.queue.is_empty());
    assert_eq!(h.remote.logouts.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(h.supervisor.snapshot().logouts, 1);
}

#[tokio::test]
async fn test_transient_refresh_failure_keeps_state() {
    let h = Harness::new(HarnessOptions {
        refresher: ScriptedRefresher::new(vec![RefreshStep::Fail]),
        ..HarnessOptions::default()
    });
    h.connect_ready().await;

    assert_eq!(h.supervisor.on_unauthorized().await, AuthOutcome::Transient);
    assert_eq!(h.supervisor.current_state(), ConnectionState::ChatReady);
    assert_eq!(h.supervisor.snapshot().refresh_failures, 1);

    // Next rejection tries again and succeeds.
    assert_eq!(
        h.supervisor.on_unauthorized().await,
        AuthOutcome::Refreshed(ConnectionState::ChatReady)
    );
    assert_eq!(h.refresher.calls(), 2);
}

#[tokio::test]
async fn test_non_credential_errors_are_not_supervisor_business() {
    let h = Harness::new(HarnessOptions::default());
    h.connect_ready().await;

    let outcome = h
        .supervisor
        .handle_error(&ErrorEnvelope::session(ErrorCode::RateLimited, "slow down"))
        .await;

    assert_eq!(outcome, None);
    assert_eq!(h.refresher.calls(), 0);
}

// =============================================================================
// BOOTSTRAP
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_bootstrap_retries_until_download_succeeds() {
    let h = Harness::new(HarnessOptions {
        supervisor: SupervisorConfig::default(),
        downloader: ScriptedDownloader::failing_first(2),
        ..HarnessOptions::default()
    });

    h.supervisor.bootstrap().await.unwrap();

    assert_eq!(h.downloader.calls(), 3);
    assert_eq!(h.supervisor.current_state(), ConnectionState::Connecting);
    assert_eq!(h.cache.load(), Some(remote_config(1)));
    assert_eq!(h.supervisor.snapshot().bootstrap_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_bootstrap_gives_up_after_three_attempts() {
    let h = Harness::new(HarnessOptions {
        supervisor: SupervisorConfig::default(),
        downloader: ScriptedDownloader::always_failing(),
        ..HarnessOptions::default()
    });

    let err = h.supervisor.bootstrap().await.unwrap_err();

    assert!(matches!(err, BootstrapError::Exhausted { attempts: 3, .. }));
    assert_eq!(h.downloader.calls(), 3);
    assert_eq!(h.supervisor.current_state(), ConnectionState::Uninitialized);
    assert!(!h.supervisor.is_downloading());
    assert_eq!(h.supervisor.snapshot().bootstrap_attempts, 3);
    assert_eq!(h.supervisor.snapshot().bootstrap_failures, 1);
}

#[tokio::test]
async fn test_cached_config_skips_download() {
    let h = Harness::new(HarnessOptions {
        cached_config: Some(remote_config(4)),
        ..HarnessOptions::default()
    });

    h.supervisor.bootstrap().await.unwrap();

    assert_eq!(h.downloader.calls(), 0);
    assert_eq!(h.supervisor.active_config(), Some(remote_config(4)));
    assert!(!h.supervisor.on_network_available().await.unwrap());
}

// =============================================================================
// CLOSE AND RE-CHECK
// =============================================================================

#[tokio::test]
async fn test_close_rechecks_config_and_records_new_version() {
    let h = Harness::new(HarnessOptions {
        cached_config: Some(remote_config(1)),
        ..HarnessOptions::default()
    });
    h.connect_ready().await;
    h.downloader.serve(remote_config(2));

    h.drive(&[ConnectionEvent::Closed {
        reason: Some("server restart".to_string()),
    }])
    .await;

    assert_eq!(h.supervisor.current_state(), ConnectionState::Closed);
    assert_eq!(h.cache.load(), Some(remote_config(2)));
    assert_eq!(h.supervisor.active_config(), Some(remote_config(2)));
    assert_eq!(h.supervisor.snapshot().config_updates, 1);

    // Same version again: nothing to record.
    h.connect_ready().await;
    h.drive(&[ConnectionEvent::Closed { reason: None }]).await;
    assert_eq!(h.supervisor.snapshot().config_updates, 1);
}

// =============================================================================
// RUN LOOP
// =============================================================================

#[tokio::test]
async fn test_run_loop_follows_bus_lifecycle_and_errors() {
    let h = Harness::new(HarnessOptions {
        emit_lifecycle: true,
        ..HarnessOptions::default()
    });
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (commands_tx, commands_rx) = mpsc::channel(1);

    let events = h.supervisor.attach();
    let supervisor = h.supervisor.clone();
    let run = tokio::spawn(async move { supervisor.run(events, commands_rx, shutdown_rx).await });

    // Bootstrap runs inside the loop; the lifecycle events the transport
    // publishes while connecting are applied after it returns.
    let (command, outcome) = SupervisorCommand::bootstrap();
    commands_tx.send(command).await.unwrap();
    outcome.await.unwrap().unwrap();
    let mut state = h.supervisor.subscribe_state();
    tokio::time::timeout(Duration::from_secs(2), state.wait_for(ConnectionState::is_connected))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(h.supervisor.snapshot().transitions, 3);

    h.bus
        .publish_error(ErrorEnvelope::session(ErrorCode::Unauthorized, "expired"))
        .await;
    while h.refresher.calls() == 0 {
        tokio::task::yield_now().await;
    }
    while h.supervisor.snapshot().refresh_successes == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(h.supervisor.current_state(), ConnectionState::ChatReady);

    shutdown_tx.send(true).unwrap();
    run.await.unwrap();
}

#[tokio::test]
async fn test_network_command_retries_bootstrap_inside_the_loop() {
    let h = Harness::new(HarnessOptions {
        emit_lifecycle: true,
        downloader: ScriptedDownloader::failing_first(3),
        ..HarnessOptions::default()
    });
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (commands_tx, commands_rx) = mpsc::channel(2);

    let events = h.supervisor.attach();
    let supervisor = h.supervisor.clone();
    let run = tokio::spawn(async move { supervisor.run(events, commands_rx, shutdown_rx).await });

    let (command, outcome) = SupervisorCommand::bootstrap();
    commands_tx.send(command).await.unwrap();
    assert!(matches!(
        outcome.await.unwrap(),
        Err(BootstrapError::Exhausted { attempts: 3, .. })
    ));
    assert_eq!(h.supervisor.current_state(), ConnectionState::Uninitialized);

    commands_tx
        .send(SupervisorCommand::NetworkAvailable)
        .await
        .unwrap();
    let mut state = h.supervisor.subscribe_state();
    tokio::time::timeout(Duration::from_secs(2), state.wait_for(ConnectionState::is_connected))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(h.downloader.calls(), 4);

    shutdown_tx.send(true).unwrap();
    run.await.unwrap();
}
