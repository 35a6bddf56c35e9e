//! Connection state transition table.
//!
//! ```text
//! ┌───────────────────────┬────────────────┬────────────┬───────────────────┐
//! │ From                  │ Event          │ To         │ Effect            │
//! ├───────────────────────┼────────────────┼────────────┼───────────────────┤
//! │ any                   │ Connecting     │ Connecting │ -                 │
//! │ Connecting            │ SocketOpen     │ AsyncReady │ -                 │
//! │ AsyncReady            │ Authenticated  │ ChatReady  │ reset session     │
//! │ Connecting/AsyncReady │ Closed         │ Closed     │ re-check config   │
//! │ /ChatReady            │                │            │                   │
//! └───────────────────────┴────────────────┴────────────┴───────────────────┘
//! ```
//!
//! Anything else is ignored.

use shared_bus::ConnectionEvent;
use shared_types::ConnectionState;

/// Side effect attached to a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Clear the pending registry and cancel the outbound queue.
    ResetSession,
    /// Fetch remote configuration once more.
    RecheckConfig,
}

/// An accepted transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ConnectionState,
    pub to: ConnectionState,
    pub effect: Effect,
}

/// Look up the transition for `event` in state `from`.
pub fn next(from: ConnectionState, event: &ConnectionEvent) -> Option<Transition> {
    use ConnectionState::*;

    let (to, effect) = match (from, event) {
        (_, ConnectionEvent::Connecting) => (Connecting, Effect::None),
        (Connecting, ConnectionEvent::SocketOpen) => (AsyncReady, Effect::None),
        (AsyncReady, ConnectionEvent::Authenticated) => (ChatReady, Effect::ResetSession),
        (Connecting | AsyncReady | ChatReady, ConnectionEvent::Closed { .. }) => {
            (Closed, Effect::RecheckConfig)
        }
        _ => return None,
    };
    Some(Transition { from, to, effect })
}
