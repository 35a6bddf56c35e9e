//! # Registry Sweep
//!
//! Optional housekeeping that drops pending entries nobody will ever claim,
//! for example after a transport silently lost a request. A waiter whose
//! entry is swept can no longer resolve, so the TTL must exceed any
//! realistic answer latency.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use pl_01_pending_registry::PendingRequestRegistry;

/// Sweep `registry` every `ttl / 2`, removing entries older than `ttl`.
pub async fn run_registry_sweep(
    registry: Arc<PendingRequestRegistry>,
    ttl: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> usize {
    info!(ttl_secs = ttl.as_secs(), "[registry] Sweep started");
    let mut ticker = tokio::time::interval((ttl / 2).max(Duration::from_millis(10)));
    // The first tick fires immediately.
    ticker.tick().await;
    let mut total = 0;

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("[registry] Shutdown signal received");
                break;
            }
            _ = ticker.tick() => {
                let removed = registry.remove_older_than(ttl);
                if removed > 0 {
                    warn!(removed = removed, "Swept stale pending requests");
                }
                total += removed;
            }
        }
    }
    total
}
