//! Request kinds.
//!
//! A kind ties together the key prefix, the bus topic its answers arrive
//! on, how a caller's request becomes a wire body, and how a response
//! payload becomes the caller's result.

use crate::domain::transform::{order_history, reaction_rows};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_bus::EventTopic;
use shared_types::{ChannelId, ChatMessage, MessageId, PinnedMessage, ReactionRow, RequestBody, ResponsePayload};

/// One kind of correlated request.
pub trait RequestKind: Send + Sync + 'static {
    /// Correlation key prefix. Must be unique across kinds.
    const PREFIX: &'static str;

    /// Response channel topic to listen on.
    const TOPIC: EventTopic;

    /// Whether cache-derived envelopes may resolve this kind.
    const ACCEPTS_CACHED: bool = true;

    /// What the caller passes in.
    type Request: Send + 'static;

    /// What the caller gets back.
    type Response: Send + 'static;

    /// Build the wire body.
    fn into_body(request: Self::Request) -> RequestBody;

    /// Turn a payload into the caller's result, or `None` if the payload
    /// belongs to another kind.
    fn extract(payload: &ResponsePayload) -> Option<Self::Response>;
}

// =============================================================================
// REQUEST / RESPONSE VALUES
// =============================================================================

/// Page request for channel history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryQuery {
    pub channel: ChannelId,
    pub before: Option<DateTime<Utc>>,
    pub limit: u32,
}

/// Transformed history page: oldest first, unique ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub channel: ChannelId,
    pub messages: Vec<ChatMessage>,
}

/// Reaction count request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionQuery {
    pub channel: ChannelId,
    pub message_ids: Vec<MessageId>,
}

/// Message addressed by pin and unpin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinTarget {
    pub channel: ChannelId,
    pub message_id: MessageId,
}

// =============================================================================
// KINDS
// =============================================================================

/// Fetch a page of channel history.
pub struct FetchHistory;

impl RequestKind for FetchHistory {
    const PREFIX: &'static str = "history";
    const TOPIC: EventTopic = EventTopic::History;
    type Request = HistoryQuery;
    type Response = HistoryPage;

    fn into_body(request: HistoryQuery) -> RequestBody {
        RequestBody::FetchHistory {
            channel: request.channel,
            before: request.before,
            limit: request.limit,
        }
    }

    fn extract(payload: &ResponsePayload) -> Option<HistoryPage> {
        match payload {
            ResponsePayload::History { channel, messages } => Some(HistoryPage {
                channel: channel.clone(),
                messages: order_history(messages.clone()),
            }),
            _ => None,
        }
    }
}

/// Count reactions and fold them into display rows.
pub struct CountReactions;

impl RequestKind for CountReactions {
    const PREFIX: &'static str = "reactions";
    const TOPIC: EventTopic = EventTopic::Reactions;
    type Request = ReactionQuery;
    type Response = Vec<ReactionRow>;

    fn into_body(request: ReactionQuery) -> RequestBody {
        RequestBody::CountReactions {
            channel: request.channel,
            message_ids: request.message_ids,
        }
    }

    fn extract(payload: &ResponsePayload) -> Option<Vec<ReactionRow>> {
        match payload {
            ResponsePayload::ReactionCounts { tallies, .. } => Some(reaction_rows(tallies.clone())),
            _ => None,
        }
    }
}

/// Pin a message.
pub struct PinMessage;

impl RequestKind for PinMessage {
    const PREFIX: &'static str = "pin";
    const TOPIC: EventTopic = EventTopic::Pins;
    type Request = PinTarget;
    type Response = PinnedMessage;

    fn into_body(request: PinTarget) -> RequestBody {
        RequestBody::Pin {
            channel: request.channel,
            message_id: request.message_id,
        }
    }

    fn extract(payload: &ResponsePayload) -> Option<PinnedMessage> {
        match payload {
            ResponsePayload::Pinned(pinned) => Some(pinned.clone()),
            _ => None,
        }
    }
}

/// Unpin a message. A replayed confirmation is not proof the unpin
/// happened, so cached envelopes are ignored.
pub struct UnpinMessage;

impl RequestKind for UnpinMessage {
    const PREFIX: &'static str = "unpin";
    const TOPIC: EventTopic = EventTopic::Pins;
    const ACCEPTS_CACHED: bool = false;
    type Request = PinTarget;
    type Response = PinTarget;

    fn into_body(request: PinTarget) -> RequestBody {
        RequestBody::Unpin {
            channel: request.channel,
            message_id: request.message_id,
        }
    }

    fn extract(payload: &ResponsePayload) -> Option<PinTarget> {
        match payload {
            ResponsePayload::Unpinned {
                channel,
                message_id,
            } => Some(PinTarget {
                channel: channel.clone(),
                message_id: message_id.clone(),
            }),
            _ => None,
        }
    }
}
