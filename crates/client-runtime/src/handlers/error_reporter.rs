//! # Error Reporter
//!
//! Watches the shared error channel. Every domain error is counted by code;
//! presentable ones are logged as user-facing notices. Correlated waiters
//! and the supervisor consume the same envelopes independently.

use futures::StreamExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use parley_telemetry::DOMAIN_ERRORS;
use shared_bus::EventStream;
use shared_types::ErrorEnvelope;

/// Handler for the shared error channel.
pub struct ErrorReporter {
    stream: EventStream<ErrorEnvelope>,
}

impl ErrorReporter {
    pub fn new(stream: EventStream<ErrorEnvelope>) -> Self {
        Self { stream }
    }

    /// Run until shutdown or until the bus closes. Returns the number of
    /// envelopes seen.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> u64 {
        info!("[errors] Error reporter started");
        let mut seen = 0u64;

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("[errors] Shutdown signal received");
                    break;
                }
                next = self.stream.next() => match next {
                    Some(envelope) => {
                        seen += 1;
                        report(&envelope);
                    }
                    None => break,
                },
            }
        }
        seen
    }
}

fn report(envelope: &ErrorEnvelope) {
    let code = envelope.code.to_string();
    DOMAIN_ERRORS.with_label_values(&[code.as_str()]).inc();

    if envelope.presentable {
        warn!(code = %envelope.code, detail = %envelope.detail, "User-facing error");
    } else {
        debug!(code = %envelope.code, matchers = ?envelope.matchers, "Domain error");
    }
}
