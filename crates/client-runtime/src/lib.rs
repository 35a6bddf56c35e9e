//! # Client Runtime Library
//!
//! Wires the Parley subsystems into a running client. The binary in
//! `main.rs` is a thin shell over [`ClientRuntime`].
//!
//! ## Modules
//!
//! - `container/` - configuration and the service container
//! - `adapters/` - loopback transport and local session ports
//! - `handlers/` - background tasks (error reporting, metrics, registry sweep)
//! - `runtime` - startup, readiness and shutdown

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod container;
pub mod handlers;
pub mod runtime;

pub use container::{ClientConfig, ClientContainer, ConfigError};
pub use runtime::ClientRuntime;
