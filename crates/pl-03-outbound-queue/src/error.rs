//! Error types for the Outbound Request Queue

use shared_types::{CorrelationKey, TransportError};
use thiserror::Error;

/// Errors reported by the outbound queue.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    /// A drained entry could not be handed to the remote service.
    #[error("Failed to send queued request {key}: {source}")]
    SendFailed {
        key: CorrelationKey,
        #[source]
        source: TransportError,
    },
}
