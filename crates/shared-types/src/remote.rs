//! # Remote Service Port
//!
//! The boundary to the real-time transport. Implementations own the socket;
//! the correlation layer only issues calls and listens for the envelopes the
//! transport publishes on the event bus.

use async_trait::async_trait;

use crate::entities::RemoteConfig;
use crate::errors::TransportError;
use crate::ipc::OutboundRequest;

/// Remote real-time service (Driven Port).
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Open a connection using the given configuration.
    ///
    /// Progress is reported asynchronously as lifecycle events on the bus.
    async fn connect(&self, config: &RemoteConfig) -> Result<(), TransportError>;

    /// Close the connection.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Send one correlated request. The answer arrives later on the bus.
    async fn send(&self, request: OutboundRequest) -> Result<(), TransportError>;

    /// End the remote session for the current user.
    async fn logout(&self) -> Result<(), TransportError>;
}
