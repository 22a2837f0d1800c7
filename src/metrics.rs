use anyhow::{Context, Result};
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub const FRAMES_TOTAL: &str = "vigil_frames_total";
pub const EVENTS_FORWARDED_TOTAL: &str = "vigil_events_forwarded_total";
pub const EVENTS_REJECTED_TOTAL: &str = "vigil_events_rejected_total";
pub const CONNECTS_TOTAL: &str = "vigil_connects_total";
pub const DISCONNECTS_TOTAL: &str = "vigil_disconnects_total";
pub const DELIVERY_ERRORS_TOTAL: &str = "vigil_delivery_errors_total";
pub const LAST_EVENT_TS: &str = "vigil_last_event_ts";

/// One-time metric descriptions (so series show up on /metrics with help text).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(FRAMES_TOTAL, "SSE frames received from the feed.");
        describe_counter!(
            EVENTS_FORWARDED_TOTAL,
            "Founding events delivered to the webhook."
        );
        describe_counter!(
            EVENTS_REJECTED_TOTAL,
            "Founding events dropped by the validator, by reason."
        );
        describe_counter!(CONNECTS_TOTAL, "Feed connection attempts.");
        describe_counter!(DISCONNECTS_TOTAL, "Feed connections lost or refused.");
        describe_counter!(DELIVERY_ERRORS_TOTAL, "Webhook deliveries that failed.");
        describe_gauge!(LAST_EVENT_TS, "Unix ts of the last forwarded event.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder.
    pub fn init() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// `/health` and `/metrics` (Prometheus exposition format).
    pub fn router(&self) -> Router {
        router(self.handle.clone())
    }

    /// Serve the router on `addr` in the background.
    pub async fn serve(&self, addr: SocketAddr) -> Result<JoinHandle<()>> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding metrics listener on {addr}"))?;
        info!(target: "vigil", %addr, "metrics endpoint listening");

        let app = self.router();
        Ok(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                warn!(target: "vigil", error = %e, "metrics endpoint stopped");
            }
        }))
    }
}

pub fn router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
}
