//! Error types for the Connection Supervisor

use thiserror::Error;

/// Bootstrap download failures.
///
/// Recovered locally up to the retry bound; past it they are logged, never
/// propagated to a user-facing caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BootstrapError {
    /// One download attempt failed.
    #[error("Download failed: {0}")]
    Download(String),

    /// Every attempt failed.
    #[error("Bootstrap gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    /// Another download is running.
    #[error("Bootstrap download already in progress")]
    AlreadyInProgress,
}

/// Credential refresh failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The credential can never be refreshed; the session must end.
    #[error("Credential revoked")]
    Revoked,

    /// Refresh failed for a reason that may clear up on its own.
    #[error("Credential refresh failed: {0}")]
    Transient(String),
}
