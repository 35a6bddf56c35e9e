//! Supervisor configuration.

use std::time::Duration;

/// Connection supervisor configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Download attempts per bootstrap before giving up
    pub max_bootstrap_attempts: u32,
    /// Pause between failed download attempts
    pub bootstrap_retry_delay: Duration,
    /// Fetch remote configuration again after the connection closes
    pub recheck_config_on_close: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_bootstrap_attempts: 3,
            bootstrap_retry_delay: Duration::from_secs(2),
            recheck_config_on_close: true,
        }
    }
}
