//! # Correlation Choreography
//!
//! Requester, pending registry and bus under concurrent traffic.
//!
//! ```text
//! Requester ──register──→ Registry
//!     │                      ↑
//!     └──send──→ Remote      │ claim(key | prefix)
//!                  │         │
//!                  └─publish─→ Bus ──→ every waiter of the topic
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use pl_01_pending_registry::PendingRequestRegistry;
use pl_02_requester::{
    CountReactions, FetchHistory, HistoryQuery, PinMessage, PinTarget, ReactionQuery,
    RequesterError, UnpinMessage,
};
use shared_bus::EventPublisher;
use shared_types::{
    ChannelId, CorrelationKey, ErrorCode, ErrorEnvelope, MessageId, PinnedMessage, RequestBody,
    ResponseEnvelope, ResponsePayload,
};

use crate::fixtures::{answer, Harness, HarnessOptions, Reply};

fn hold() -> Harness {
    Harness::new(HarnessOptions {
        reply: Reply::Hold,
        ..HarnessOptions::default()
    })
}

fn target(id: &str) -> PinTarget {
    PinTarget {
        channel: ChannelId::from("general"),
        message_id: MessageId::from(id),
    }
}

fn history_query() -> HistoryQuery {
    HistoryQuery {
        channel: ChannelId::from("general"),
        before: None,
        limit: 50,
    }
}

// =============================================================================
// ISOLATION
// =============================================================================

#[tokio::test]
async fn test_concurrent_requests_answered_out_of_order_do_not_cross() {
    let h = hold();
    let requester = h.ctx.requester::<PinMessage>();

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let requester = requester.clone();
            let target = target(&format!("m{i}"));
            tokio::spawn(async move {
                let pinned = requester.send(target.clone(), false).await.unwrap();
                (target, pinned)
            })
        })
        .collect();

    let sent = h.remote.wait_for_sent(20).await;
    for request in sent.iter().rev() {
        h.bus.publish_response(answer(request)).await;
    }

    for handle in handles {
        let (target, pinned) = handle.await.unwrap();
        assert_eq!(pinned.message_id, target.message_id);
    }
    assert!(h.registry.is_empty());
    assert_eq!(h.ctx.stats().snapshot().succeeded, 20);
}

#[test]
fn test_concurrent_prefix_claims_have_distinct_winners() {
    let registry = Arc::new(PendingRequestRegistry::new());
    let body = RequestBody::Pin {
        channel: ChannelId::from("general"),
        message_id: MessageId::from("m1"),
    };
    for _ in 0..16 {
        registry
            .register(CorrelationKey::generate("pin"), body.clone())
            .unwrap();
    }

    let claimers: Vec<_> = (0..32)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.claim("pin").map(|entry| entry.key))
        })
        .collect();

    let winners: Vec<CorrelationKey> = claimers
        .into_iter()
        .filter_map(|t| t.join().unwrap())
        .collect();
    let distinct: HashSet<_> = winners.iter().cloned().collect();

    assert_eq!(winners.len(), 16);
    assert_eq!(distinct.len(), 16);
    assert!(registry.is_empty());
    assert_eq!(registry.snapshot().total_claimed, 16);
}

// =============================================================================
// SINGLE RESOLUTION
// =============================================================================

#[tokio::test]
async fn test_duplicate_delivery_resolves_with_first_event() {
    let h = hold();
    let requester = h.ctx.requester::<PinMessage>();
    let handle = tokio::spawn(async move { requester.send(target("m1"), false).await });

    let sent = h.remote.wait_for_sent(1).await;
    let key = &sent[0].key;
    let first = PinnedMessage {
        channel: ChannelId::from("general"),
        message_id: MessageId::from("m1"),
        pinned_at: Utc.timestamp_opt(10, 0).unwrap(),
    };
    let second = PinnedMessage {
        pinned_at: Utc.timestamp_opt(20, 0).unwrap(),
        ..first.clone()
    };
    h.bus
        .publish_response(ResponseEnvelope::for_key(key, ResponsePayload::Pinned(first.clone())))
        .await;
    h.bus
        .publish_response(ResponseEnvelope::for_key(key, ResponsePayload::Pinned(second)))
        .await;

    assert_eq!(handle.await.unwrap().unwrap(), first);
    assert_eq!(h.registry.snapshot().total_claimed, 1);
}

#[tokio::test]
async fn test_error_then_success_resolves_with_error() {
    let h = hold();
    let requester = h.ctx.requester::<UnpinMessage>();
    let handle = tokio::spawn(async move { requester.send(target("m1"), false).await });

    let sent = h.remote.wait_for_sent(1).await;
    let request = sent[0].clone();
    h.bus
        .publish_error(
            ErrorEnvelope::for_key(&request.key, ErrorCode::NotFound, "not pinned").presentable(),
        )
        .await;

    let err = handle.await.unwrap().unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::NotFound));
    assert!(err.is_presentable());

    // A late success finds nothing left to claim.
    h.bus.publish_response(answer(&request)).await;
    assert!(h.registry.is_empty());
    assert_eq!(h.registry.snapshot().total_claimed, 1);
    assert_eq!(h.ctx.stats().snapshot().failed, 1);
}

#[tokio::test]
async fn test_cached_confirmation_ignored_by_unpin_only() {
    let h = hold();
    let unpin = h.ctx.requester::<UnpinMessage>();
    let handle = tokio::spawn(async move { unpin.send(target("m1"), false).await });

    let sent = h.remote.wait_for_sent(1).await;
    h.bus.publish_response(answer(&sent[0]).cached()).await;
    h.bus.publish_response(answer(&sent[0])).await;

    assert_eq!(handle.await.unwrap().unwrap(), target("m1"));
    assert_eq!(h.ctx.stats().snapshot().ignored_cached, 1);

    let pin = h.ctx.requester::<PinMessage>();
    let handle = tokio::spawn(async move { pin.send(target("m2"), false).await });
    let sent = h.remote.wait_for_sent(2).await;
    h.bus.publish_response(answer(&sent[1]).cached()).await;

    assert_eq!(handle.await.unwrap().unwrap().message_id, MessageId::from("m2"));
    assert_eq!(h.ctx.stats().snapshot().ignored_cached, 1);
}

// =============================================================================
// PREFIX ENVELOPES
// =============================================================================

fn pinned(id: &str) -> ResponsePayload {
    ResponsePayload::Pinned(PinnedMessage {
        channel: ChannelId::from("general"),
        message_id: MessageId::from(id),
        pinned_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    })
}

#[tokio::test]
async fn test_prefix_envelope_resolves_exactly_one_waiter() {
    let h = hold();
    let pins = h.ctx.requester::<PinMessage>();
    let reactions = h.ctx.requester::<CountReactions>();

    let mut waiters = Vec::new();
    for (n, id) in ["m1", "m2", "m3"].into_iter().enumerate() {
        let pins = pins.clone();
        waiters.push(tokio::spawn(async move { pins.send(target(id), false).await }));
        h.remote.wait_for_sent(n + 1).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    let other = tokio::spawn(async move {
        reactions
            .send(
                ReactionQuery {
                    channel: ChannelId::from("general"),
                    message_ids: vec![MessageId::from("m1")],
                },
                false,
            )
            .await
    });
    let sent = h.remote.wait_for_sent(4).await;

    h.bus
        .publish_response(ResponseEnvelope::for_prefix("pin", pinned("m1")))
        .await;

    // One event, one claim: the oldest pin waiter gets it.
    let mut waiters = waiters.into_iter();
    let first = waiters.next().unwrap().await.unwrap().unwrap();
    assert_eq!(first.message_id, MessageId::from("m1"));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.registry.snapshot().total_claimed, 1);
    assert_eq!(h.registry.len(), 3);

    // The other pins are still pending and get their own answers.
    for (waiter, id) in waiters.zip(["m2", "m3"]) {
        assert!(!waiter.is_finished());
        let request = sent
            .iter()
            .find(|r| matches!(&r.body, RequestBody::Pin { message_id, .. } if message_id.0 == id))
            .unwrap();
        h.bus.publish_response(answer(request)).await;
        assert_eq!(waiter.await.unwrap().unwrap().message_id, MessageId::from(id));
    }

    let pending = sent
        .iter()
        .find(|r| r.key.prefix() == "reactions")
        .unwrap();
    h.bus.publish_response(answer(pending)).await;
    assert_eq!(other.await.unwrap().unwrap().len(), 1);
    assert!(h.registry.is_empty());
    assert_eq!(h.registry.snapshot().total_claimed, 4);
}

#[tokio::test]
async fn test_prefix_error_fails_exactly_one_waiter() {
    let h = hold();
    let history = h.ctx.requester::<FetchHistory>();

    let mut waiters = Vec::new();
    for n in 0..3 {
        let history = history.clone();
        waiters.push(tokio::spawn(async move { history.send(history_query(), false).await }));
        h.remote.wait_for_sent(n + 1).await;
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let mut error = ErrorEnvelope::session(ErrorCode::RateLimited, "slow down");
    error.matchers.push("history".to_string());
    h.bus.publish_error(error).await;

    let mut waiters = waiters.into_iter();
    let err = waiters.next().unwrap().await.unwrap().unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::RateLimited));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.registry.len(), 2);
    for waiter in waiters {
        assert!(!waiter.is_finished());
        waiter.abort();
    }
}

// =============================================================================
// ABANDONMENT
// =============================================================================

#[tokio::test]
async fn test_timeout_releases_registry_entry() {
    let h = hold();
    let requester = h.ctx.requester::<PinMessage>();

    let err = requester
        .send_timeout(target("m1"), false, Duration::from_millis(50))
        .await
        .unwrap_err();

    assert!(matches!(err, RequesterError::TimedOut { operation: "pin", .. }));
    assert!(h.registry.is_empty());
    assert_eq!(h.registry.snapshot().total_released, 1);
    assert_eq!(h.ctx.stats().snapshot().timed_out, 1);
    assert_eq!(h.bus.subscription_count(shared_bus::EventTopic::Pins), 0);
}

#[tokio::test]
async fn test_timed_out_queueable_request_never_reaches_remote() {
    let h = hold();
    let requester = h.ctx.requester::<PinMessage>();

    let err = requester
        .send_timeout(target("m1"), true, Duration::from_millis(50))
        .await
        .unwrap_err();

    assert!(matches!(err, RequesterError::TimedOut { .. }));
    assert!(h.registry.is_empty());
    assert!(h.queue.is_empty());

    let report = h.queue.flush_all(h.remote.as_ref()).await;
    assert_eq!(report.total(), 0);
    assert!(h.remote.sent().is_empty());
}

#[tokio::test]
async fn test_error_channel_observers_see_claimed_errors() {
    let h = hold();
    let mut observer = h.bus.subscribe_errors();
    let requester = h.ctx.requester::<PinMessage>();
    let handle = tokio::spawn(async move { requester.send(target("m9"), false).await });

    let sent = h.remote.wait_for_sent(1).await;
    h.bus
        .publish_error(ErrorEnvelope::for_key(&sent[0].key, ErrorCode::NotFound, "no such message"))
        .await;

    let err = handle.await.unwrap().unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::NotFound));
    assert!(!err.is_presentable());

    let seen = observer.recv().await.unwrap();
    assert_eq!(seen.code, ErrorCode::NotFound);
    assert!(seen.satisfies(&sent[0].key));
}

// =============================================================================
// PROPERTIES
// =============================================================================

mod properties {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Register(usize),
        ClaimKey(usize),
        ClaimPrefix(usize),
        Release(usize),
        Clear,
    }

    const KINDS: [&str; 3] = ["history", "reactions", "pin"];

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0..KINDS.len()).prop_map(Op::Register),
            2 => (0..64usize).prop_map(Op::ClaimKey),
            2 => (0..KINDS.len()).prop_map(Op::ClaimPrefix),
            1 => (0..64usize).prop_map(Op::Release),
            1 => Just(Op::Clear),
        ]
    }

    proptest! {
        #[test]
        fn registry_hands_each_entry_out_once(ops in proptest::collection::vec(op(), 1..80)) {
            let registry = PendingRequestRegistry::new();
            let mut live: Vec<CorrelationKey> = Vec::new();
            let mut handed_out: HashSet<CorrelationKey> = HashSet::new();
            let body = RequestBody::Pin {
                channel: ChannelId::from("general"),
                message_id: MessageId::from("m1"),
            };

            for op in ops {
                match op {
                    Op::Register(kind) => {
                        let key = CorrelationKey::generate(KINDS[kind]);
                        registry.register(key.clone(), body.clone()).unwrap();
                        live.push(key);
                    }
                    Op::ClaimKey(i) if !live.is_empty() => {
                        let key = live.remove(i % live.len());
                        let entry = registry.claim(key.as_str()).unwrap();
                        prop_assert_eq!(&entry.key, &key);
                        prop_assert!(handed_out.insert(entry.key));
                    }
                    Op::ClaimPrefix(kind) => {
                        let prefix = KINDS[kind];
                        match registry.claim(prefix) {
                            Some(entry) => {
                                prop_assert_eq!(entry.key.prefix(), prefix);
                                live.retain(|k| k != &entry.key);
                                prop_assert!(handed_out.insert(entry.key));
                            }
                            None => {
                                prop_assert!(live.iter().all(|k| k.prefix() != prefix));
                            }
                        }
                    }
                    Op::Release(i) if !live.is_empty() => {
                        let key = live.remove(i % live.len());
                        prop_assert!(registry.release(&key));
                        prop_assert!(!registry.release(&key));
                    }
                    Op::Clear => {
                        prop_assert_eq!(registry.clear(), live.len());
                        live.clear();
                    }
                    _ => {}
                }
                prop_assert_eq!(registry.len(), live.len());
            }
        }
    }
}
