//! # Session Adapters
//!
//! Local implementations of the supervisor's download and refresh ports,
//! used with the loopback transport.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::debug;

use pl_04_connection_supervisor::{
    AuthError, BootstrapBundle, BootstrapError, ConfigDownloader, CredentialRefresher,
};
use shared_types::{AssetBundle, Credential, RemoteConfig};

/// Serves a fixed configuration and asset bundle.
///
/// The first `fail_first` downloads fail, to exercise bootstrap retry.
pub struct StaticConfigDownloader {
    config: RwLock<RemoteConfig>,
    assets: AssetBundle,
    fail_first: AtomicU32,
    downloads: AtomicU32,
}

impl StaticConfigDownloader {
    pub fn new(config: RemoteConfig, assets: AssetBundle) -> Self {
        Self {
            config: RwLock::new(config),
            assets,
            fail_first: AtomicU32::new(0),
            downloads: AtomicU32::new(0),
        }
    }

    /// Default loopback configuration.
    pub fn loopback() -> Self {
        Self::new(
            RemoteConfig {
                version: 1,
                endpoint: "loopback://local".to_string(),
                app_id: "parley".to_string(),
            },
            AssetBundle {
                version: "loopback-1".to_string(),
                size_bytes: 0,
            },
        )
    }

    /// Fail the next `count` downloads.
    pub fn fail_next(&self, count: u32) {
        self.fail_first.store(count, Ordering::SeqCst);
    }

    /// Replace the served configuration, as if the server rolled out a new one.
    pub fn publish(&self, config: RemoteConfig) {
        *self.config.write() = config;
    }

    /// Download attempts so far.
    pub fn download_count(&self) -> u32 {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigDownloader for StaticConfigDownloader {
    async fn download(&self) -> Result<BootstrapBundle, BootstrapError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(BootstrapError::Download("loopback download unavailable".to_string()));
        }
        Ok(BootstrapBundle {
            config: self.config.read().clone(),
            assets: self.assets.clone(),
        })
    }

    async fn fetch_config(&self) -> Result<RemoteConfig, BootstrapError> {
        Ok(self.config.read().clone())
    }
}

/// Issues locally minted credentials.
pub struct LocalCredentialRefresher {
    issued: AtomicU64,
    validity: chrono::Duration,
    revoked: AtomicBool,
}

impl LocalCredentialRefresher {
    pub fn new(validity: chrono::Duration) -> Self {
        Self {
            issued: AtomicU64::new(0),
            validity,
            revoked: AtomicBool::new(false),
        }
    }

    /// Make every further refresh report a revoked session.
    pub fn revoke(&self) {
        self.revoked.store(true, Ordering::SeqCst);
    }

    /// Credentials issued so far.
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }
}

impl Default for LocalCredentialRefresher {
    fn default() -> Self {
        Self::new(chrono::Duration::hours(1))
    }
}

#[async_trait]
impl CredentialRefresher for LocalCredentialRefresher {
    async fn refresh(&self) -> Result<Credential, AuthError> {
        if self.revoked.load(Ordering::SeqCst) {
            return Err(AuthError::Revoked);
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(serial = n, "Issuing local credential");
        Ok(Credential {
            access_token: format!("loopback-token-{n}"),
            expires_at: Utc::now() + self.validity,
        })
    }
}
