//! # Core Domain Entities
//!
//! Chat-side values that flow through requests and responses.
//!
//! ## Clusters
//!
//! - **Conversation**: `ChannelId`, `MessageId`, `ChatMessage`
//! - **Reactions & Pins**: `ReactionTally`, `ReactionRow`, `PinnedMessage`
//! - **Session**: `RemoteConfig`, `AssetBundle`, `Credential`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// CLUSTER A: CONVERSATION
// =============================================================================

/// Identifier of a chat channel (room).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier of a single message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A chat message as delivered by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message identifier.
    pub id: MessageId,
    /// Channel the message belongs to.
    pub channel: ChannelId,
    /// Sender display identifier.
    pub sender: String,
    /// Message body.
    pub body: String,
    /// Server-side send time.
    pub sent_at: DateTime<Utc>,
}

// =============================================================================
// CLUSTER B: REACTIONS & PINS
// =============================================================================

/// One raw reaction count as reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionTally {
    /// Message the reaction is attached to.
    pub message_id: MessageId,
    /// Reaction emoji or shortcode.
    pub emoji: String,
    /// Number of users who reacted.
    pub count: u32,
}

/// Derived view row: all reactions for a single message, ordered for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionRow {
    /// Message the row describes.
    pub message_id: MessageId,
    /// `(emoji, count)` pairs, highest count first, ties broken by emoji.
    pub reactions: Vec<(String, u32)>,
    /// Sum of all counts in the row.
    pub total: u32,
}

/// A pinned message reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedMessage {
    /// Channel in which the message is pinned.
    pub channel: ChannelId,
    /// The pinned message.
    pub message_id: MessageId,
    /// When the pin was applied.
    pub pinned_at: DateTime<Utc>,
}

// =============================================================================
// CLUSTER C: SESSION
// =============================================================================

/// Remote configuration fetched during bootstrap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Monotonic configuration version.
    pub version: u64,
    /// Real-time endpoint to connect to.
    pub endpoint: String,
    /// Tenant / application identifier.
    pub app_id: String,
}

/// Asset bundle required before the first connect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBundle {
    /// Bundle version tag.
    pub version: String,
    /// Bundle size in bytes.
    pub size_bytes: u64,
}

/// Session credential held by the external token store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Opaque access token.
    pub access_token: String,
    /// Token expiry.
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
