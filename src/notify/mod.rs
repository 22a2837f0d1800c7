pub mod discord;
pub mod format;

pub use discord::{DiscordNotifier, WebhookPayload};

use anyhow::Result;

/// Delivers a finished payload to the messaging endpoint. One attempt, no retry.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, payload: &WebhookPayload) -> Result<()>;
}
