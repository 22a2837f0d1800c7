// tests/consumer_reconnect.rs
//
// Connection lifecycle of the stream consumer against a scripted transport.
// Time is paused, so the 5s reconnect delay and the idle timeout elapse
// instantly and precisely.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

use founding_vigil::config::file::StoredConfig;
use founding_vigil::ingest::sse::SseFrame;
use founding_vigil::ingest::{FeedTransport, FrameStream, StreamConsumer};
use founding_vigil::{Notifier, Settings, WebhookPayload};

/// What one `connect()` call does.
enum Script {
    Refuse,
    Frames(Vec<Result<SseFrame, String>>),
    /// Connected, but no bytes ever arrive (half-open socket).
    Silent,
}

struct ScriptedFeed {
    connects: Arc<AtomicUsize>,
    script: Mutex<VecDeque<Script>>,
}

impl ScriptedFeed {
    fn new(script: Vec<Script>) -> (Self, Arc<AtomicUsize>) {
        let connects = Arc::new(AtomicUsize::new(0));
        let feed = Self {
            connects: connects.clone(),
            script: Mutex::new(script.into()),
        };
        (feed, connects)
    }
}

#[async_trait]
impl FeedTransport for ScriptedFeed {
    async fn connect(&self) -> Result<FrameStream> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            // Once the script runs out every connect fails right away.
            None | Some(Script::Refuse) => Err(anyhow!("connection refused")),
            Some(Script::Frames(items)) => Ok(stream::iter(
                items.into_iter().map(|r| r.map_err(|e| anyhow!(e))),
            )
            .boxed()),
            Some(Script::Silent) => Ok(stream::pending().boxed()),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

#[derive(Default)]
struct Recorder {
    sent: Mutex<Vec<WebhookPayload>>,
}

#[async_trait]
impl Notifier for Recorder {
    async fn deliver(&self, payload: &WebhookPayload) -> Result<()> {
        self.sent.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

fn settings() -> Arc<Settings> {
    Arc::new(
        Settings::from_stored(StoredConfig {
            webhook: Some("https://discord.test/hook".into()),
            user_agent: Some("Testlandia".into()),
            ..Default::default()
        })
        .expect("settings"),
    )
}

fn founding(name: &str) -> SseFrame {
    SseFrame::message(format!(
        r#"{{"str":"@@{name}@@ was founded in %%lazarus%%."}}"#
    ))
}

#[tokio::test(start_paused = true)]
async fn reconnects_once_after_fixed_delay_when_stream_fails_immediately() {
    let (feed, connects) =
        ScriptedFeed::new(vec![Script::Frames(vec![Err("read timeout".into())])]);
    let consumer = StreamConsumer::new(Arc::new(feed), Arc::new(Recorder::default()), settings());

    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn(consumer.run(rx));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(connects.load(Ordering::SeqCst), 1, "first connect");

    // Still inside the 5s delay: no reconnect yet.
    tokio::time::sleep(Duration::from_millis(4_900)).await;
    assert_eq!(connects.load(Ordering::SeqCst), 1, "no early reconnect");

    // Just past the delay: exactly one more attempt.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(connects.load(Ordering::SeqCst), 2, "one reconnect after 5s");

    tx.send(true).unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn keeps_retrying_refused_connections_forever() {
    let (feed, connects) = ScriptedFeed::new(vec![]);
    let consumer = StreamConsumer::new(Arc::new(feed), Arc::new(Recorder::default()), settings());

    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn(consumer.run(rx));

    tokio::time::sleep(Duration::from_secs(60) + Duration::from_millis(10)).await;
    // t=0, 5, 10, ..., 60
    assert_eq!(connects.load(Ordering::SeqCst), 13);

    tx.send(true).unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn forwards_in_order_and_reconnects_after_eof() {
    let (feed, connects) = ScriptedFeed::new(vec![
        Script::Frames(vec![
            Ok(founding("alpha")),
            Ok(SseFrame {
                event: "heartbeat".into(),
                data: "{}".into(),
                id: None,
            }),
            Ok(SseFrame::message("garbage")),
            Ok(founding("puppet99")),
            Ok(founding("beta")),
        ]),
        Script::Refuse,
        Script::Frames(vec![Ok(founding("gamma"))]),
    ]);
    let recorder = Arc::new(Recorder::default());
    let consumer = StreamConsumer::new(Arc::new(feed), recorder.clone(), settings());

    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn(consumer.run(rx));

    // EOF at t=0, refused at t=5, third connection at t=10.
    tokio::time::sleep(Duration::from_millis(10_010)).await;
    assert_eq!(connects.load(Ordering::SeqCst), 3);

    let titles: Vec<String> = recorder
        .sent
        .lock()
        .unwrap()
        .iter()
        .map(|p| p.embeds[0].title.clone())
        .collect();
    assert_eq!(
        titles,
        vec![
            "📜 A Banner Unfurled — alpha was founded in Lazarus".to_string(),
            "📜 A Banner Unfurled — beta was founded in Lazarus".to_string(),
            "📜 A Banner Unfurled — gamma was founded in Lazarus".to_string(),
        ]
    );

    tx.send(true).unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn silent_connection_is_dropped_after_idle_timeout() {
    let (feed, connects) = ScriptedFeed::new(vec![Script::Silent]);
    let settings = Arc::new(
        Settings::from_stored(StoredConfig {
            webhook: Some("https://discord.test/hook".into()),
            user_agent: Some("Testlandia".into()),
            idle_timeout_secs: Some(30),
            ..Default::default()
        })
        .expect("settings"),
    );
    let consumer = StreamConsumer::new(Arc::new(feed), Arc::new(Recorder::default()), settings);

    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn(consumer.run(rx));

    // Idle for 30s, then the 5s reconnect delay.
    tokio::time::sleep(Duration::from_millis(34_900)).await;
    assert_eq!(connects.load(Ordering::SeqCst), 1, "still waiting on the silent stream");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(connects.load(Ordering::SeqCst), 2, "reconnected after idle + delay");

    tx.send(true).unwrap();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_silent_stream() {
    let (feed, connects) = ScriptedFeed::new(vec![Script::Silent]);
    let consumer = StreamConsumer::new(Arc::new(feed), Arc::new(Recorder::default()), settings());

    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn(consumer.run(rx));

    tokio::time::sleep(Duration::from_secs(10)).await;
    tx.send(true).unwrap();
    task.await.unwrap();

    assert_eq!(connects.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_interrupts_reconnect_delay() {
    let (feed, connects) = ScriptedFeed::new(vec![]);
    let consumer = StreamConsumer::new(Arc::new(feed), Arc::new(Recorder::default()), settings());

    let (tx, rx) = watch::channel(false);
    let task = tokio::spawn(consumer.run(rx));

    tokio::time::sleep(Duration::from_secs(1)).await;
    tx.send(true).unwrap();
    task.await.unwrap();

    assert_eq!(connects.load(Ordering::SeqCst), 1);
}

struct Stalled;

#[async_trait]
impl Notifier for Stalled {
    async fn deliver(&self, _payload: &WebhookPayload) -> Result<()> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn stalled_webhook_cannot_block_ingestion() {
    let consumer = StreamConsumer::new(
        Arc::new(ScriptedFeed::new(vec![]).0),
        Arc::new(Stalled),
        settings(),
    );
    let outcome = consumer.handle_frame(founding("alpha")).await;
    assert_eq!(outcome, founding_vigil::ingest::FrameOutcome::DeliveryFailed);
}
