//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Log filter directive (trace, debug, info, warn, error, or a full
    /// `EnvFilter` expression)
    pub log_level: String,

    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,

    /// Include the event target (module path) in human-readable output
    pub show_target: bool,

    /// Register Prometheus metrics
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "parley-client".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            show_target: true,
            metrics_enabled: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PARLEY_SERVICE_NAME`: Service name (default: parley-client)
    /// - `PARLEY_LOG_LEVEL` or `RUST_LOG`: Log filter (default: info)
    /// - `PARLEY_JSON_LOGS`: JSON output (default: false, true in containers)
    /// - `PARLEY_METRICS`: Register metrics (default: true)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();
        let defaults = Self::default();

        Self {
            service_name: env::var("PARLEY_SERVICE_NAME").unwrap_or(defaults.service_name),

            log_level: env::var("PARLEY_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            json_logs: env::var("PARLEY_JSON_LOGS")
                .map(|v| parse_flag(&v))
                .unwrap_or(is_container),

            show_target: defaults.show_target,

            metrics_enabled: env::var("PARLEY_METRICS")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.metrics_enabled),
        }
    }
}

/// `true`, `1`, `yes` and `on` (any case) are true.
pub(crate) fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
