//! # Correlated Requester (Subsystem 02)
//!
//! Single-resolution request/response on top of a broadcast event bus.
//!
//! ## Exchange Lifecycle
//!
//! ```text
//! [Pending] ──claim(success)──→ [Resolved] → Ok(response)
//!     │     ──claim(error)────→ [Resolved] → Err(Failed)
//!     ├──── registry purge ───→ [Cancelled] → Err(Purged)
//!     └──── drop / timeout ───→ [Cancelled] → registry entry released,
//!                                             queued request withdrawn
//! ```
//!
//! ## Rules
//!
//! - An envelope naming a full key is claimed with that key by its owner.
//! - An envelope naming only a kind prefix is claimed once, by the first
//!   waiter to see it, with `registry.claim(prefix)`. The oldest entry of
//!   the kind wins; if it belongs to another waiter the envelope is
//!   forwarded to that waiter's mailbox.
//! - Resolution happens once. Returning from `send` ends the exchange and
//!   drops both bus subscriptions.
//! - No retries. A failed or voided exchange is reported to the caller as is.
//!
//! ## Request Kinds
//!
//! | Kind | Prefix | Cached envelopes |
//! |------|--------|------------------|
//! | `FetchHistory` | `history` | accepted |
//! | `CountReactions` | `reactions` | accepted |
//! | `PinMessage` | `pin` | accepted |
//! | `UnpinMessage` | `unpin` | ignored |

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod domain;
pub mod error;
pub mod service;

pub use domain::{
    CountReactions, FetchHistory, HistoryPage, HistoryQuery, PinMessage, PinTarget, ReactionQuery,
    RequestKind, UnpinMessage,
};
pub use error::RequesterError;
pub use service::{Requester, RequesterContext, RequesterSnapshot, RequesterStats};
