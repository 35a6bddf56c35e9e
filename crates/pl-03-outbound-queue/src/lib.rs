//! # Outbound Request Queue (Subsystem 03)
//!
//! FIFO of requests whose callers opted into deferred dispatch because the
//! connection might not be ready yet.
//!
//! ## Operations
//!
//! | Method | Effect |
//! |--------|--------|
//! | `enqueue()` | Append an entry |
//! | `flush_all()` | Drain every entry and send it, in insertion order |
//! | `cancel_all()` | Drop every entry without sending |
//! | `withdraw()` | Drop one entry whose owner gave up on it |
//!
//! Draining is atomic: an entry is either still queued or already handed
//! to the sender, never both. Cancelling never resolves a waiting
//! requester; those are voided through the pending registry.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod error;

pub use domain::{FlushReport, OutboundRequestQueue, QueueSnapshot, QueueStats};
pub use error::QueueError;
