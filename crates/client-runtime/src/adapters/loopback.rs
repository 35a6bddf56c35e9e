//! # Loopback Transport
//!
//! In-process `RemoteService` that answers requests from an in-memory chat
//! store by publishing envelopes on the bus, the same way a real socket
//! transport would.
//!
//! ```text
//! connect()    → Connecting, SocketOpen, Authenticated
//! send(req)    → ResponseEnvelope | ErrorEnvelope keyed to req.key
//! disconnect() → Closed
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, info};

use shared_bus::{ConnectionEvent, EventPublisher, InMemoryEventBus};
use shared_types::{
    ChannelId, ChatMessage, CorrelationKey, ErrorCode, ErrorEnvelope, MessageId, OutboundRequest,
    PinnedMessage, ReactionTally, RemoteConfig, RemoteService, RequestBody, ResponseEnvelope,
    ResponsePayload, TransportError,
};

/// Server-side chat state held by the loopback transport.
#[derive(Debug, Default)]
struct ChatStore {
    messages: Vec<ChatMessage>,
    reactions: Vec<ReactionTally>,
    pins: HashMap<(ChannelId, MessageId), PinnedMessage>,
}

impl ChatStore {
    fn answer(&mut self, body: RequestBody) -> Result<ResponsePayload, ErrorEnvelopeSeed> {
        match body {
            RequestBody::FetchHistory {
                channel,
                before,
                limit,
            } => {
                // Newest first, like a paging server.
                let mut page: Vec<ChatMessage> = self
                    .messages
                    .iter()
                    .filter(|m| m.channel == channel)
                    .filter(|m| before.map_or(true, |b| m.sent_at < b))
                    .cloned()
                    .collect();
                page.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
                page.truncate(limit as usize);
                Ok(ResponsePayload::History {
                    channel,
                    messages: page,
                })
            }
            RequestBody::CountReactions {
                channel,
                message_ids,
            } => {
                let tallies = self
                    .reactions
                    .iter()
                    .filter(|t| message_ids.contains(&t.message_id))
                    .cloned()
                    .collect();
                Ok(ResponsePayload::ReactionCounts { channel, tallies })
            }
            RequestBody::Pin {
                channel,
                message_id,
            } => {
                if !self.has_message(&channel, &message_id) {
                    return Err(ErrorEnvelopeSeed::not_found(&message_id));
                }
                let pinned = self
                    .pins
                    .entry((channel.clone(), message_id.clone()))
                    .or_insert_with(|| PinnedMessage {
                        channel,
                        message_id,
                        pinned_at: Utc::now(),
                    })
                    .clone();
                Ok(ResponsePayload::Pinned(pinned))
            }
            RequestBody::Unpin {
                channel,
                message_id,
            } => {
                if self
                    .pins
                    .remove(&(channel.clone(), message_id.clone()))
                    .is_none()
                {
                    return Err(ErrorEnvelopeSeed::not_found(&message_id));
                }
                Ok(ResponsePayload::Unpinned {
                    channel,
                    message_id,
                })
            }
        }
    }

    fn has_message(&self, channel: &ChannelId, id: &MessageId) -> bool {
        self.messages
            .iter()
            .any(|m| &m.channel == channel && &m.id == id)
    }
}

/// Error code and detail, keyed once the request key is known.
#[derive(Debug)]
struct ErrorEnvelopeSeed {
    code: ErrorCode,
    detail: String,
    presentable: bool,
}

impl ErrorEnvelopeSeed {
    fn not_found(id: &MessageId) -> Self {
        Self {
            code: ErrorCode::NotFound,
            detail: format!("message {id} not found"),
            presentable: true,
        }
    }

    fn into_envelope(self, key: &CorrelationKey) -> ErrorEnvelope {
        let envelope = ErrorEnvelope::for_key(key, self.code, self.detail);
        if self.presentable {
            envelope.presentable()
        } else {
            envelope
        }
    }
}

/// In-process transport that echoes answers onto the bus.
pub struct LoopbackRemote {
    bus: InMemoryEventBus,
    connected: AtomicBool,
    store: Mutex<ChatStore>,
    /// Upcoming sends to reject with `Unauthorized`.
    rejections: AtomicU32,
    connects: AtomicU32,
}

impl LoopbackRemote {
    pub fn new(bus: InMemoryEventBus) -> Self {
        Self {
            bus,
            connected: AtomicBool::new(false),
            store: Mutex::new(ChatStore::default()),
            rejections: AtomicU32::new(0),
            connects: AtomicU32::new(0),
        }
    }

    /// Load messages and reaction tallies into the store.
    pub fn seed(&self, messages: Vec<ChatMessage>, reactions: Vec<ReactionTally>) {
        let mut store = self.store.lock();
        store.messages.extend(messages);
        store.reactions.extend(reactions);
    }

    /// Reject the next `count` sends as if the credential had expired.
    pub fn expire_credential(&self, count: u32) {
        self.rejections.store(count, Ordering::SeqCst);
    }

    /// Drop the socket from the server side.
    pub async fn drop_connection(&self, reason: &str) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.bus
                .publish_lifecycle(ConnectionEvent::Closed {
                    reason: Some(reason.to_string()),
                })
                .await;
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Successful `connect()` calls so far.
    pub fn connect_count(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn pinned_count(&self) -> usize {
        self.store.lock().pins.len()
    }

    fn take_rejection(&self) -> bool {
        self.rejections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl RemoteService for LoopbackRemote {
    async fn connect(&self, config: &RemoteConfig) -> Result<(), TransportError> {
        info!(endpoint = %config.endpoint, version = config.version, "Loopback connecting");
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.bus.publish_lifecycle(ConnectionEvent::Connecting).await;
        self.connected.store(true, Ordering::SeqCst);
        self.bus.publish_lifecycle(ConnectionEvent::SocketOpen).await;
        self.bus.publish_lifecycle(ConnectionEvent::Authenticated).await;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.drop_connection("client disconnect").await;
        Ok(())
    }

    async fn send(&self, request: OutboundRequest) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        let OutboundRequest { key, body } = request;
        let operation = body.operation();

        if self.take_rejection() {
            debug!(key = %key, "Loopback rejecting credential");
            self.bus
                .publish_error(ErrorEnvelope::for_key(
                    &key,
                    ErrorCode::Unauthorized,
                    "credential expired",
                ))
                .await;
            return Ok(());
        }

        let answer = self.store.lock().answer(body);
        match answer {
            Ok(payload) => {
                debug!(key = %key, operation = operation, payload = payload.kind(), "Loopback answering");
                self.bus
                    .publish_response(ResponseEnvelope::for_key(&key, payload))
                    .await;
            }
            Err(seed) => {
                debug!(key = %key, operation = operation, code = %seed.code, "Loopback failing request");
                self.bus.publish_error(seed.into_envelope(&key)).await;
            }
        }
        Ok(())
    }

    async fn logout(&self) -> Result<(), TransportError> {
        info!("Loopback session ended");
        Ok(())
    }
}
