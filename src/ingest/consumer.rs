// src/ingest/consumer.rs
//! Connection lifecycle for the founding feed.
//!
//! ```text
//! Disconnected --delay--> Connecting --ok--> Streaming
//!      ^                      |                  |
//!      +------ error ---------+-- error/EOF/idle +
//! ```
//!
//! There is no terminal state: the loop only returns when the shutdown
//! channel flips to `true` (or its sender is dropped).

use anyhow::anyhow;
use futures::StreamExt;
use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::ingest::sse::SseFrame;
use crate::ingest::transport::FeedTransport;
use crate::ingest::types::{ExtractedEvent, RawEvent, Rejection};
use crate::ingest::validate;
use crate::metrics::{
    CONNECTS_TOTAL, DELIVERY_ERRORS_TOTAL, DISCONNECTS_TOTAL, EVENTS_FORWARDED_TOTAL,
    EVENTS_REJECTED_TOTAL, FRAMES_TOTAL, LAST_EVENT_TS,
};
use crate::notify::{format, Notifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Disconnected,
    Connecting,
    Streaming,
}

/// What happened to a single frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Not a `message` frame, empty, or not an event object.
    Skipped,
    Rejected(Rejection),
    Forwarded,
    DeliveryFailed,
}

pub struct StreamConsumer {
    transport: Arc<dyn FeedTransport>,
    notifier: Arc<dyn Notifier>,
    settings: Arc<Settings>,
    reconnect_delay: Duration,
    delivery_timeout: Duration,
    idle_timeout: Duration,
    state: ConsumerState,
}

impl StreamConsumer {
    pub fn new(
        transport: Arc<dyn FeedTransport>,
        notifier: Arc<dyn Notifier>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            reconnect_delay: Duration::from_secs(settings.reconnect_delay_secs),
            delivery_timeout: Duration::from_secs(settings.delivery_timeout_secs),
            idle_timeout: Duration::from_secs(settings.idle_timeout_secs),
            transport,
            notifier,
            settings,
            state: ConsumerState::Disconnected,
        }
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    fn set_state(&mut self, next: ConsumerState) {
        if self.state != next {
            debug!(target: "vigil", from = ?self.state, to = ?next, "consumer state");
            self.state = next;
        }
    }

    /// Connect, stream, reconnect after a fixed delay; until shutdown.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            target: "vigil",
            transport = self.transport.name(),
            delay_secs = self.reconnect_delay.as_secs(),
            idle_secs = self.idle_timeout.as_secs(),
            "stream consumer started"
        );

        'outer: loop {
            self.set_state(ConsumerState::Connecting);
            counter!(CONNECTS_TOTAL).increment(1);
            info!(target: "vigil", "connecting to founding stream");

            let connected = tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break 'outer,
                r = self.transport.connect() => r,
            };

            let lost = match connected {
                Ok(mut frames) => {
                    self.set_state(ConsumerState::Streaming);
                    info!(target: "vigil", "connected to stream");
                    loop {
                        // A half-open socket yields nothing forever; silence counts as loss.
                        let next = tokio::select! {
                            biased;
                            _ = shutdown_requested(&mut shutdown) => break 'outer,
                            f = tokio::time::timeout(self.idle_timeout, frames.next()) => f,
                        };
                        match next {
                            Ok(Some(Ok(frame))) => {
                                self.handle_frame(frame).await;
                            }
                            Ok(Some(Err(e))) => break e,
                            Ok(None) => break anyhow!("feed closed the stream"),
                            Err(_) => {
                                break anyhow!("no frames from feed for {:?}", self.idle_timeout)
                            }
                        }
                    }
                }
                Err(e) => e,
            };

            self.set_state(ConsumerState::Disconnected);
            counter!(DISCONNECTS_TOTAL).increment(1);
            warn!(target: "vigil", error = ?lost, "connection lost");
            info!(
                target: "vigil",
                delay_secs = self.reconnect_delay.as_secs(),
                "reconnecting after delay"
            );

            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break 'outer,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }

        self.set_state(ConsumerState::Disconnected);
        info!(target: "vigil", "stream consumer stopped");
    }

    /// Validate, format and deliver one frame. Never fails; the outcome is for
    /// logging and tests.
    pub async fn handle_frame(&self, frame: SseFrame) -> FrameOutcome {
        counter!(FRAMES_TOTAL).increment(1);

        if !frame.is_message() || frame.data.trim().is_empty() {
            return FrameOutcome::Skipped;
        }
        let Ok(raw) = serde_json::from_str::<RawEvent>(&frame.data) else {
            return FrameOutcome::Skipped;
        };

        if let Err(reason) = validate::check(&raw, &self.settings.exclusions) {
            debug!(target: "vigil", reason = reason.reason(), "{reason}");
            counter!(EVENTS_REJECTED_TOTAL, "reason" => reason.reason()).increment(1);
            return FrameOutcome::Rejected(reason);
        }
        let Some(event) = ExtractedEvent::from_raw(&raw) else {
            return FrameOutcome::Rejected(Rejection::MissingSubject);
        };

        info!(
            target: "vigil",
            nation = %event.subject_name,
            region = %event.region_name,
            verb = %event.verb,
            "valid founding event"
        );

        let nations = vec![event.subject_name.clone()];
        let payload = format::build_payload(&nations, &event, &self.settings);

        match tokio::time::timeout(self.delivery_timeout, self.notifier.deliver(&payload)).await {
            Ok(Ok(())) => {
                counter!(EVENTS_FORWARDED_TOTAL).increment(1);
                gauge!(LAST_EVENT_TS).set(chrono::Utc::now().timestamp() as f64);
                FrameOutcome::Forwarded
            }
            Ok(Err(e)) => {
                counter!(DELIVERY_ERRORS_TOTAL).increment(1);
                warn!(
                    target: "vigil",
                    nation = %event.subject_name,
                    error = ?e,
                    "webhook delivery failed"
                );
                FrameOutcome::DeliveryFailed
            }
            Err(_) => {
                counter!(DELIVERY_ERRORS_TOTAL).increment(1);
                warn!(
                    target: "vigil",
                    nation = %event.subject_name,
                    timeout_secs = self.delivery_timeout.as_secs(),
                    "webhook delivery timed out"
                );
                FrameOutcome::DeliveryFailed
            }
        }
    }
}

/// Resolves once shutdown is requested or the sender is gone.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
