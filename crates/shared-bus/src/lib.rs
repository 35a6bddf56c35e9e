//! # Shared Bus - Typed Event Bus
//!
//! Broadcast publish/subscribe between the transport and the correlation
//! layer.
//!
//! ## Rules
//!
//! - One typed channel per event kind: responses, errors, lifecycle.
//! - The bus performs no per-subscriber correlation; every subscriber sees
//!   every event on its channel (optionally narrowed by topic).
//! - Only the transport publishes. Subsystems subscribe.
//! - Dropping a `Subscription` unsubscribes.
//!
//! ```text
//! ┌──────────────┐   publish_*()   ┌──────────────┐   subscribe_*()   ┌────────────┐
//! │  Transport   │ ──────────────► │  Event Bus   │ ────────────────► │ Requesters │
//! └──────────────┘                 │ responses    │                   │ Supervisor │
//!                                  │ errors       │                   │ Reporters  │
//!                                  │ lifecycle    │                   └────────────┘
//!                                  └──────────────┘
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{ConnectionEvent, EventFilter, EventTopic, Topical};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per channel before subscribers lag.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
