//! Domain layer for the connection supervisor.

pub mod config;
pub mod state;

pub use config::SupervisorConfig;
pub use state::{next, Effect, Transition};

use shared_types::ConnectionState;

/// Result of handling a credential rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// New credential stored; the connection is in the given state.
    Refreshed(ConnectionState),
    /// The credential was revoked and the session torn down.
    LoggedOut,
    /// Refresh failed; left for the next request to trigger again.
    Transient,
    /// Another refresh was already running.
    AlreadyRefreshing,
}
