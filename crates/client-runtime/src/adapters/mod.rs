//! # Adapters
//!
//! Port implementations that let the client run without a network:
//!
//! - `LoopbackRemote`: `RemoteService` answering from an in-memory store
//! - `StaticConfigDownloader`: `ConfigDownloader` serving a fixed config
//! - `LocalCredentialRefresher`: `CredentialRefresher` minting local tokens

pub mod loopback;
pub mod session;

pub use loopback::LoopbackRemote;
pub use session::{LocalCredentialRefresher, StaticConfigDownloader};
