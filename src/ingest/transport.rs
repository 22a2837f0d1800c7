// src/ingest/transport.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use std::time::Duration;

use crate::ingest::sse::{SseDecoder, SseFrame};

/// Frames of one live connection. An `Err` item or the end of the stream
/// means the connection is gone.
pub type FrameStream = BoxStream<'static, Result<SseFrame>>;

/// Opens connections to the founding feed.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    async fn connect(&self) -> Result<FrameStream>;
    fn name(&self) -> &'static str;
}

/// Streaming GET against the live SSE endpoint.
pub struct HttpFeed {
    client: Client,
    url: String,
    user_agent: String,
    connect_timeout: Duration,
}

impl HttpFeed {
    pub fn new(url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            user_agent: user_agent.into(),
            connect_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout = Duration::from_secs(secs);
        self
    }
}

#[async_trait]
impl FeedTransport for HttpFeed {
    async fn connect(&self) -> Result<FrameStream> {
        // Only the handshake is bounded; the body stays open indefinitely.
        let send = self
            .client
            .get(&self.url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "text/event-stream")
            .send();
        let rsp = tokio::time::timeout(self.connect_timeout, send)
            .await
            .map_err(|_| anyhow!("feed connect timed out after {:?}", self.connect_timeout))?
            .with_context(|| format!("feed http get {}", self.url))?
            .error_for_status()
            .context("feed non-2xx")?;

        Ok(decode_frames(rsp.bytes_stream()))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Turn a raw byte stream into decoded frames.
pub fn decode_frames<S, B, E>(bytes: S) -> FrameStream
where
    S: futures::Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    bytes
        .scan(SseDecoder::new(), |decoder, chunk| {
            let frames: Vec<Result<SseFrame>> = match chunk {
                Ok(b) => decoder.push(b.as_ref()).into_iter().map(Ok).collect(),
                Err(e) => vec![Err(anyhow::Error::new(e).context("feed stream read"))],
            };
            futures::future::ready(Some(futures::stream::iter(frames)))
        })
        .flatten()
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn decode_frames_across_chunks() {
        let chunks: Vec<std::result::Result<Vec<u8>, std::io::Error>> = vec![
            Ok(b"data: one\n".to_vec()),
            Ok(b"\n: ping\n\ndata: t".to_vec()),
            Ok(b"wo\n\n".to_vec()),
        ];
        let frames: Vec<_> = decode_frames(futures::stream::iter(chunks))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .map(|f| f.unwrap().data)
            .collect();
        assert_eq!(frames, vec!["one".to_string(), "two".to_string()]);
    }

    #[tokio::test]
    async fn read_errors_surface_as_items() {
        let chunks: Vec<std::result::Result<Vec<u8>, std::io::Error>> = vec![
            Ok(b"data: one\n\n".to_vec()),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let items = decode_frames(futures::stream::iter(chunks))
            .collect::<Vec<_>>()
            .await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }
}
