//! Domain layer for the pending request registry.

pub mod pending;
pub mod registry;

pub use pending::PendingRequest;
pub use registry::{PendingRequestRegistry, RegistrySnapshot, RegistryStats};
