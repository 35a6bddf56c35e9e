//! # Client Configuration
//!
//! Unified configuration for all subsystems and runtime parameters.
//!
//! Every value has a sane default. `ClientConfig::from_env()` overrides
//! them from `PARLEY_*` environment variables; `validate()` rejects values
//! that would leave the client unable to run.

use std::time::Duration;

use parley_telemetry::TelemetryConfig;
use pl_04_connection_supervisor::SupervisorConfig;
use thiserror::Error;
use tracing::warn;

/// Complete client configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Requester configuration.
    pub requester: RequesterConfig,
    /// Connection supervisor configuration.
    pub supervisor: SupervisorConfig,
    /// Event bus configuration.
    pub bus: BusConfig,
    /// Logging and metrics configuration.
    pub telemetry: TelemetryConfig,
    /// Background housekeeping.
    pub runtime: RuntimeConfig,
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Bootstrap would never attempt a download.
    #[error("max bootstrap attempts must be at least 1")]
    ZeroBootstrapAttempts,

    /// Broadcast channels need room for at least one event.
    #[error("bus capacity must be at least 1")]
    ZeroBusCapacity,

    /// A zero request timeout fails every request immediately.
    #[error("request timeout must be non-zero")]
    ZeroRequestTimeout,

    /// A zero sampling interval would spin.
    #[error("metrics interval must be non-zero")]
    ZeroMetricsInterval,

    /// An environment variable held a value that does not parse.
    #[error("invalid value {value:?} for {name}")]
    InvalidValue { name: &'static str, value: String },
}

impl ClientConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Variables
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `PARLEY_REQUEST_TIMEOUT_MS` | `requester.default_timeout` |
    /// | `PARLEY_MAX_BOOTSTRAP_ATTEMPTS` | `supervisor.max_bootstrap_attempts` |
    /// | `PARLEY_BOOTSTRAP_RETRY_MS` | `supervisor.bootstrap_retry_delay` |
    /// | `PARLEY_RECHECK_CONFIG_ON_CLOSE` | `supervisor.recheck_config_on_close` |
    /// | `PARLEY_BUS_CAPACITY` | `bus.capacity` |
    /// | `PARLEY_PENDING_TTL_SECS` | `runtime.pending_ttl` (0 disables) |
    /// | `PARLEY_METRICS_INTERVAL_MS` | `runtime.metrics_interval` |
    ///
    /// Telemetry settings are read by [`TelemetryConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            telemetry: TelemetryConfig::from_env(),
            ..Self::default()
        };

        if let Some(ms) = parse_var::<u64, _>(&lookup, "PARLEY_REQUEST_TIMEOUT_MS")? {
            config.requester.default_timeout = Duration::from_millis(ms);
        }
        if let Some(attempts) = parse_var(&lookup, "PARLEY_MAX_BOOTSTRAP_ATTEMPTS")? {
            config.supervisor.max_bootstrap_attempts = attempts;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "PARLEY_BOOTSTRAP_RETRY_MS")? {
            config.supervisor.bootstrap_retry_delay = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup("PARLEY_RECHECK_CONFIG_ON_CLOSE") {
            config.supervisor.recheck_config_on_close = parse_bool("PARLEY_RECHECK_CONFIG_ON_CLOSE", &raw)?;
        }
        if let Some(capacity) = parse_var(&lookup, "PARLEY_BUS_CAPACITY")? {
            config.bus.capacity = capacity;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "PARLEY_PENDING_TTL_SECS")? {
            config.runtime.pending_ttl = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "PARLEY_METRICS_INTERVAL_MS")? {
            config.runtime.metrics_interval = Duration::from_millis(ms);
        }

        Ok(config)
    }

    /// Reject configurations the client cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.supervisor.max_bootstrap_attempts == 0 {
            return Err(ConfigError::ZeroBootstrapAttempts);
        }
        if self.bus.capacity == 0 {
            return Err(ConfigError::ZeroBusCapacity);
        }
        if self.requester.default_timeout.is_zero() {
            return Err(ConfigError::ZeroRequestTimeout);
        }
        if self.runtime.metrics_interval.is_zero() {
            return Err(ConfigError::ZeroMetricsInterval);
        }
        if self.supervisor.bootstrap_retry_delay.is_zero() {
            warn!("Bootstrap retry delay is zero; retries will not back off");
        }
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
    }
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: raw.to_string(),
        }),
    }
}

/// Requester configuration.
#[derive(Debug, Clone)]
pub struct RequesterConfig {
    /// Timeout used by the runtime's demo and convenience calls.
    /// `Requester::send` itself never times out.
    pub default_timeout: Duration,
}

impl Default for RequesterConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
        }
    }
}

/// Event bus configuration.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Events buffered per channel before slow subscribers lag.
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: shared_bus::DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Background task configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Release pending entries older than this. `None` disables the sweep.
    pub pending_ttl: Option<Duration>,
    /// How often subsystem stats are sampled into Prometheus.
    pub metrics_interval: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            pending_ttl: None,
            metrics_interval: Duration::from_secs(5),
        }
    }
}
