//! Founding Vigil: binary entrypoint.
//! Loads settings (prompting for anything missing), sends the startup summary,
//! then forwards foundings from the live feed until Ctrl-C.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use founding_vigil::config::{self, LoadOptions};
use founding_vigil::ingest::HttpFeed;
use founding_vigil::metrics::Metrics;
use founding_vigil::DiscordNotifier;

/// Compact logs by default; `VIGIL_LOG_JSON=1` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("founding_vigil=info,vigil=info,warn"));

    let json = std::env::var("VIGIL_LOG_JSON").ok().as_deref() == Some("1");
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present; no-op otherwise.
    let _ = dotenvy::dotenv();
    init_tracing();

    let mut opts = LoadOptions::from_env();
    if std::env::args().skip(1).any(|a| a == "--no-prompt") {
        opts.interactive = false;
    }

    // Prompts read stdin; keep them off the async workers.
    let settings = tokio::task::spawn_blocking(move || config::load(&opts))
        .await
        .context("config loader panicked")??;
    let settings = Arc::new(settings);

    info!(
        target: "vigil",
        feed = %settings.feed_url,
        exclusions = settings.exclusions.len(),
        templates = settings.templates.len(),
        ping = settings.role_to_ping.is_some(),
        "settings loaded"
    );

    if let Some(addr) = settings.metrics_addr {
        let metrics = Metrics::init()?;
        let _metrics_task = metrics.serve(addr).await?;
    }

    let transport = Arc::new(
        HttpFeed::new(settings.feed_url.clone(), settings.user_agent.clone())
            .with_connect_timeout(settings.connect_timeout_secs),
    );
    let notifier = Arc::new(
        DiscordNotifier::new(settings.webhook.clone())
            .with_timeout(settings.delivery_timeout_secs),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!(target: "vigil", "ctrl-c received, shutting down"),
            Err(e) => {
                warn!(target: "vigil", error = %e, "cannot listen for ctrl-c");
                // Keep the sender alive so the consumer keeps running.
                std::future::pending::<()>().await;
            }
        }
        let _ = shutdown_tx.send(true);
    });

    founding_vigil::run_pipeline(settings, transport, notifier, shutdown_rx).await;
    Ok(())
}
