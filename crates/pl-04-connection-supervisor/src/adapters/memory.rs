//! In-memory port implementations.

use crate::ports::{ConfigCache, SessionResetHook, TokenStore};
use parking_lot::RwLock;
use shared_types::{Credential, RemoteConfig};
use tracing::debug;

/// Config cache held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryConfigCache {
    config: RwLock<Option<RemoteConfig>>,
}

impl InMemoryConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache pre-seeded with a configuration.
    pub fn with_config(config: RemoteConfig) -> Self {
        Self {
            config: RwLock::new(Some(config)),
        }
    }
}

impl ConfigCache for InMemoryConfigCache {
    fn load(&self) -> Option<RemoteConfig> {
        self.config.read().clone()
    }

    fn store(&self, config: &RemoteConfig) {
        debug!(version = config.version, "Caching remote config");
        *self.config.write() = Some(config.clone());
    }
}

/// Token store held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    credential: RwLock<Option<Credential>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Credential> {
        self.credential.read().clone()
    }
}

impl TokenStore for InMemoryTokenStore {
    fn store(&self, credential: &Credential) {
        *self.credential.write() = Some(credential.clone());
    }

    fn clear(&self) {
        *self.credential.write() = None;
    }
}

/// Session reset hook that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSessionReset;

impl SessionResetHook for NoopSessionReset {
    fn reset(&self) {}
}
