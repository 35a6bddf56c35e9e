//! Ports for the connection supervisor.

pub mod outbound;

pub use outbound::{
    BootstrapBundle, ConfigCache, ConfigDownloader, CredentialRefresher, SessionResetHook,
    TokenStore,
};
