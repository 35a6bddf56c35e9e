//! # Parley Telemetry
//!
//! Logging and metrics for the Parley client.
//!
//! ## Components
//!
//! - **Logs**: `tracing` events rendered by `tracing-subscriber`, either as
//!   JSON lines or human-readable text
//! - **Metrics**: Prometheus collectors in a process-wide registry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use parley_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_telemetry(&TelemetryConfig::from_env())?;
//!     // ...
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PARLEY_SERVICE_NAME` | `parley-client` | Service name in logs |
//! | `PARLEY_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `PARLEY_JSON_LOGS` | `false` | JSON log lines |
//! | `PARLEY_METRICS` | `true` | Register Prometheus metrics |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{build_filter, init_logging};
pub use metrics::{
    advance_counter, gather_metrics, register_metrics, MetricsHandle, BOOTSTRAP, CONFIG_UPDATES,
    CONNECTION_STATE, DOMAIN_ERRORS, LOGOUTS, PENDING_REQUESTS, QUEUE_DEPTH, QUEUE_ENTRIES,
    REGISTRY_ENTRIES, REQUESTER_OUTCOMES, STATE_TRANSITIONS, TOKEN_REFRESHES,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logger: {0}")]
    LoggerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and, if enabled, metrics.
///
/// Hold the returned guard for the lifetime of the application.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = if config.metrics_enabled {
        Some(register_metrics()?)
    } else {
        None
    };
    init_logging(config)?;

    Ok(TelemetryGuard { _metrics: metrics })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _metrics: Option<MetricsHandle>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}
