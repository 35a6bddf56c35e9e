//! Outbound ports for the Connection Supervisor.
//!
//! | Port | Purpose |
//! |------|---------|
//! | `ConfigDownloader` | Fetch remote configuration and the asset bundle |
//! | `ConfigCache` | Locally cached configuration |
//! | `CredentialRefresher` | Obtain a new credential after a rejection |
//! | `TokenStore` | Persist or clear the session credential |
//! | `SessionResetHook` | Reset dependent in-memory state on logout |

use crate::error::{AuthError, BootstrapError};
use async_trait::async_trait;
use shared_types::{AssetBundle, Credential, RemoteConfig};

/// Everything a cold start needs before connecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapBundle {
    pub config: RemoteConfig,
    pub assets: AssetBundle,
}

/// Remote configuration source.
#[async_trait]
pub trait ConfigDownloader: Send + Sync {
    /// One full bootstrap download (configuration plus assets).
    async fn download(&self) -> Result<BootstrapBundle, BootstrapError>;

    /// Configuration only, used for re-checks.
    async fn fetch_config(&self) -> Result<RemoteConfig, BootstrapError>;
}

/// Locally cached remote configuration.
pub trait ConfigCache: Send + Sync {
    fn load(&self) -> Option<RemoteConfig>;
    fn store(&self, config: &RemoteConfig);
}

/// Credential refresh endpoint.
#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    /// Return a fresh credential, `AuthError::Revoked` if the session can
    /// never be refreshed, or any other error for transient failures.
    async fn refresh(&self) -> Result<Credential, AuthError>;
}

/// External credential store.
pub trait TokenStore: Send + Sync {
    fn store(&self, credential: &Credential);
    fn clear(&self);
}

/// Called once per full logout, after the remote session is closed.
pub trait SessionResetHook: Send + Sync {
    fn reset(&self);
}
