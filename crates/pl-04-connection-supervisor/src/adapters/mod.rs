//! Adapters for the connection supervisor ports.

pub mod memory;

pub use memory::{InMemoryConfigCache, InMemoryTokenStore, NoopSessionReset};
