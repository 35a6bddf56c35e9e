//! Domain layer for the outbound request queue.

pub mod queue;

pub use queue::{FlushReport, OutboundRequestQueue, QueueSnapshot, QueueStats};
