//! # Parley Client
//!
//! Runs the correlation layer against the loopback transport: bootstraps,
//! waits for `ChatReady`, issues one request of each kind and then idles
//! until Ctrl+C.
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (`PARLEY_LOG_LEVEL`, `PARLEY_JSON_LOGS`, ...)
//! 2. Load and validate configuration (`PARLEY_*`)
//! 3. Start the runtime and wait for `ChatReady`
//! 4. Demo requests
//! 5. Wait for Ctrl+C, then shut down

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use tracing::{info, warn};

use client_runtime::{ClientConfig, ClientRuntime};
use parley_telemetry::init_telemetry;
use pl_02_requester::{
    CountReactions, FetchHistory, HistoryQuery, PinMessage, PinTarget, ReactionQuery, UnpinMessage,
};
use shared_types::{ChannelId, ChatMessage, MessageId, ReactionTally};

/// Sample conversation served by the loopback transport.
fn demo_seed() -> (Vec<ChatMessage>, Vec<ReactionTally>) {
    let channel = ChannelId::from("general");
    let messages = [
        ("m1", "ana", "morning all", 1_700_000_000),
        ("m2", "ben", "standup in 5", 1_700_000_060),
        ("m3", "ana", "on my way", 1_700_000_090),
    ]
    .into_iter()
    .filter_map(|(id, sender, body, secs)| {
        Some(ChatMessage {
            id: MessageId::from(id),
            channel: channel.clone(),
            sender: sender.to_string(),
            body: body.to_string(),
            sent_at: Utc.timestamp_opt(secs, 0).single()?,
        })
    })
    .collect();

    let reactions = [("m1", ":wave:", 3), ("m2", ":thumbsup:", 2), ("m1", ":sun:", 1)]
        .into_iter()
        .map(|(id, emoji, count)| ReactionTally {
            message_id: MessageId::from(id),
            emoji: emoji.to_string(),
            count,
        })
        .collect();

    (messages, reactions)
}

async fn run_demo(runtime: &ClientRuntime, timeout: Duration) -> Result<()> {
    let channel = ChannelId::from("general");
    let target = PinTarget {
        channel: channel.clone(),
        message_id: MessageId::from("m2"),
    };

    let history = runtime.requester::<FetchHistory>();
    let reactions = runtime.requester::<CountReactions>();
    let (page, rows) = tokio::try_join!(
        history.send_timeout(
            HistoryQuery {
                channel: channel.clone(),
                before: None,
                limit: 50,
            },
            false,
            timeout,
        ),
        reactions.send_timeout(
            ReactionQuery {
                channel: channel.clone(),
                message_ids: vec![MessageId::from("m1"), MessageId::from("m2")],
            },
            false,
            timeout,
        ),
    )?;
    for message in &page.messages {
        info!(id = %message.id, sender = %message.sender, body = %message.body, "History");
    }
    for row in &rows {
        info!(id = %row.message_id, total = row.total, reactions = ?row.reactions, "Reactions");
    }

    let pinned = runtime
        .requester::<PinMessage>()
        .send_timeout(target.clone(), true, timeout)
        .await?;
    info!(id = %pinned.message_id, at = %pinned.pinned_at, "Pinned");

    let unpinned = runtime
        .requester::<UnpinMessage>()
        .send_timeout(target, true, timeout)
        .await?;
    info!(id = %unpinned.message_id, "Unpinned");

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ClientConfig::from_env().context("failed to load configuration")?;
    let _telemetry = init_telemetry(&config.telemetry)?;
    config.validate().context("invalid configuration")?;

    let timeout = config.requester.default_timeout;
    let runtime = ClientRuntime::new(config);
    let (messages, reactions) = demo_seed();
    runtime.container().remote.seed(messages, reactions);

    runtime.start().await?;
    match runtime.wait_until_ready(timeout).await {
        Ok(()) => {
            if let Err(e) = run_demo(&runtime, timeout).await {
                warn!(error = %e, "Demo requests failed");
            }
        }
        Err(e) => warn!(error = %e, "Client not ready; skipping demo"),
    }

    info!("Client is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    Ok(())
}
