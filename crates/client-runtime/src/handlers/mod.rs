//! # Background Handlers
//!
//! Long-running tasks spawned by the runtime. Each stops when the shutdown
//! watch flips to `true`.

pub mod error_reporter;
pub mod metrics_sampler;
pub mod registry_sweep;

pub use error_reporter::ErrorReporter;
pub use metrics_sampler::{state_code, MetricsSampler};
pub use registry_sweep::run_registry_sweep;
