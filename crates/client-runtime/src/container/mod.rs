//! # Client Container
//!
//! Configuration plus the container that owns every subsystem instance.

pub mod config;
pub mod services;

pub use config::{BusConfig, ClientConfig, ConfigError, RequesterConfig, RuntimeConfig};
pub use services::ClientContainer;
