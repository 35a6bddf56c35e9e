//! # Pending Request Registry (Subsystem 01)
//!
//! Process-wide map from correlation key to in-flight request. It is the
//! single consumption point that decides which waiting requester owns an
//! incoming answer.
//!
//! ## Guarantees
//!
//! - Each registered entry is claimed at most once, even when many
//!   requesters race on the same envelope.
//! - `clear()` is unconditional. It runs on reconnect and on credential
//!   rejection so stale entries can never be claimed later.
//! - Keys are unique; a duplicate registration is a contract violation and
//!   is reported as `RegistryError::DuplicateKey`.
//!
//! ## Matching
//!
//! `claim()` accepts either a full key or a bare kind prefix. A prefix
//! claims the oldest entry of that kind. See `CorrelationKey::matches`.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod error;

pub use domain::{PendingRequest, PendingRequestRegistry, RegistrySnapshot, RegistryStats};
pub use error::RegistryError;
