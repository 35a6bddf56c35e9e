//! # Error Types
//!
//! Error and state types shared across subsystems.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised by the transport collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The socket is not open.
    #[error("Not connected")]
    NotConnected,

    /// The transport refused or failed to send.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Connect attempt failed.
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    /// Any other transport failure.
    #[error("Transport error: {0}")]
    Other(String),
}

/// Connection lifecycle state.
///
/// Exactly one instance exists per client, owned by the connection
/// supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Nothing bootstrapped yet.
    #[default]
    Uninitialized,
    /// Connect attempt in flight.
    Connecting,
    /// Socket open, not yet authenticated.
    AsyncReady,
    /// Authenticated and ready for chat traffic ("connected").
    ChatReady,
    /// Socket closed or dropped.
    Closed,
}

impl ConnectionState {
    /// True only when chat traffic can flow.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::ChatReady)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Uninitialized => write!(f, "uninitialized"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::AsyncReady => write!(f, "async_ready"),
            ConnectionState::ChatReady => write!(f, "chat_ready"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}
