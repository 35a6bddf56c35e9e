//! Error types for the correlated requester

use pl_01_pending_registry::RegistryError;
use shared_types::{ErrorCode, ErrorEnvelope, TransportError};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced to the caller of `Requester::send`.
#[derive(Debug, Clone, Error)]
pub enum RequesterError {
    /// The remote service answered with a domain error.
    #[error("Request failed: {0}")]
    Failed(ErrorEnvelope),

    /// The request could not be handed to the remote service.
    #[error("Dispatch failed: {0}")]
    Dispatch(#[from] TransportError),

    /// Registry contract violation.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// `send_timeout` elapsed before a matching event arrived.
    #[error("{operation} timed out after {after:?}")]
    TimedOut {
        operation: &'static str,
        after: Duration,
    },

    /// The event bus shut down while waiting.
    #[error("Event bus closed")]
    BusClosed,

    /// The pending entry was voided by a session reset or an age sweep.
    /// No answer will arrive; the caller may retry.
    #[error("Request voided before an answer arrived")]
    Purged,
}

impl RequesterError {
    /// Domain error code, when the remote service produced one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            RequesterError::Failed(envelope) => Some(envelope.code),
            _ => None,
        }
    }

    /// Whether the error is fit to show to the end user.
    pub fn is_presentable(&self) -> bool {
        matches!(self, RequesterError::Failed(envelope) if envelope.presentable)
    }
}
