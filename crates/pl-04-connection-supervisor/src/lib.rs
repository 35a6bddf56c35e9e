//! # Connection Supervisor (Subsystem 04)
//!
//! Owns the client's `ConnectionState` and every session-wide decision:
//! bootstrap, lifecycle transitions, credential refresh and logout.
//!
//! ## State Machine
//!
//! ```text
//!                 bootstrap / Connecting event
//! [Uninitialized] ────────────────────────────→ [Connecting]
//!                                                   │ SocketOpen
//!                                                   ↓
//!                                              [AsyncReady]
//!                                                   │ Authenticated
//!                                                   ↓      (clear registry,
//!                                              [ChatReady]  cancel queue)
//!                                                   │ Closed
//!                                                   ↓      (re-check config)
//!                                               [Closed]
//! ```
//!
//! ## Bootstrap
//!
//! Cached configuration connects straight away. Otherwise `dl_reload()`
//! downloads configuration and assets, retrying up to
//! `max_bootstrap_attempts` (3) times. After that it stops until a
//! network-available signal fires, and only if nothing is cached and no
//! download is running. Both bootstrap and the network signal reach the
//! run loop as `SupervisorCommand`s, so they never interleave with
//! lifecycle handling.
//!
//! ## Credential Rejection
//!
//! | Refresh result | Effect |
//! |----------------|--------|
//! | Success while `ChatReady` | stay `ChatReady`, flush queue |
//! | Success otherwise | `Connecting`, reconnect |
//! | `Revoked` | full logout, `Uninitialized` |
//! | Other failure | logged, state unchanged |
//!
//! The registry is cleared and the queue cancelled before every refresh.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use adapters::{InMemoryConfigCache, InMemoryTokenStore, NoopSessionReset};
pub use domain::{AuthOutcome, Effect, SupervisorConfig, Transition};
pub use error::{AuthError, BootstrapError};
pub use ports::{
    BootstrapBundle, ConfigCache, ConfigDownloader, CredentialRefresher, SessionResetHook,
    TokenStore,
};
pub use service::{
    ConnectionSupervisor, SupervisorCommand, SupervisorEvents, SupervisorPorts, SupervisorSnapshot,
    SupervisorStats,
};
