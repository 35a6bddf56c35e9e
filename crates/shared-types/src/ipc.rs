//! # Request and Response Payloads
//!
//! Outbound request bodies sent to the remote service, and the domain
//! payloads it pushes back.
//!
//! ## Design Rules
//!
//! - Request bodies never carry correlation data; `OutboundRequest` pairs a
//!   body with its `CorrelationKey`.
//! - Response payloads never carry correlation data either; the enclosing
//!   `ResponseEnvelope` owns the key set.

use crate::correlation::CorrelationKey;
use crate::entities::{ChannelId, ChatMessage, MessageId, PinnedMessage, ReactionTally};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// OUTBOUND
// =============================================================================

/// Domain operation to perform against the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestBody {
    /// Fetch a page of channel history.
    FetchHistory {
        channel: ChannelId,
        /// Only messages sent strictly before this instant.
        before: Option<DateTime<Utc>>,
        limit: u32,
    },
    /// Count reactions for a set of messages.
    CountReactions {
        channel: ChannelId,
        message_ids: Vec<MessageId>,
    },
    /// Pin a message.
    Pin {
        channel: ChannelId,
        message_id: MessageId,
    },
    /// Unpin a message.
    Unpin {
        channel: ChannelId,
        message_id: MessageId,
    },
}

impl RequestBody {
    /// Short operation name used in logs and metrics labels.
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            RequestBody::FetchHistory { .. } => "fetch_history",
            RequestBody::CountReactions { .. } => "count_reactions",
            RequestBody::Pin { .. } => "pin",
            RequestBody::Unpin { .. } => "unpin",
        }
    }
}

/// A request tagged with its correlation key, ready for dispatch.
///
/// This is also the outbound queue entry: a tagged union over request kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundRequest {
    /// Key the answering event will carry.
    pub key: CorrelationKey,
    /// The operation.
    pub body: RequestBody,
}

impl OutboundRequest {
    #[must_use]
    pub fn new(key: CorrelationKey, body: RequestBody) -> Self {
        Self { key, body }
    }
}

// =============================================================================
// INBOUND
// =============================================================================

/// Domain payload of a success event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponsePayload {
    /// A page of history, in whatever order the server produced it.
    History {
        channel: ChannelId,
        messages: Vec<ChatMessage>,
    },
    /// Raw reaction tallies.
    ReactionCounts {
        channel: ChannelId,
        tallies: Vec<ReactionTally>,
    },
    /// Pin confirmation.
    Pinned(PinnedMessage),
    /// Unpin confirmation.
    Unpinned {
        channel: ChannelId,
        message_id: MessageId,
    },
}

impl ResponsePayload {
    /// Short payload name used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ResponsePayload::History { .. } => "history",
            ResponsePayload::ReactionCounts { .. } => "reaction_counts",
            ResponsePayload::Pinned(_) => "pinned",
            ResponsePayload::Unpinned { .. } => "unpinned",
        }
    }
}
