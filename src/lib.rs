// src/lib.rs
// Public library surface for integration tests and the binary.

pub mod config;
pub mod ingest;
pub mod metrics;
pub mod notify;

pub use crate::config::Settings;
pub use crate::ingest::{RawEvent, StreamConsumer};
pub use crate::notify::{DiscordNotifier, Notifier, WebhookPayload};

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

/// Send the startup summary, then run the consumer until `shutdown` fires.
///
/// A failed startup message is logged and does not keep the stream from starting.
pub async fn run_pipeline(
    settings: Arc<Settings>,
    transport: Arc<dyn ingest::FeedTransport>,
    notifier: Arc<dyn Notifier>,
    shutdown: watch::Receiver<bool>,
) {
    let startup = notify::format::build_startup_payload(&settings);
    match notifier.deliver(&startup).await {
        Ok(()) => info!(target: "vigil", "startup message sent"),
        Err(e) => warn!(target: "vigil", error = ?e, "startup message failed"),
    }

    StreamConsumer::new(transport, notifier, settings)
        .run(shutdown)
        .await;
}
