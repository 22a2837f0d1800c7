// src/ingest/sse.rs
//! Incremental decoder for `text/event-stream` bodies.
//!
//! Bytes arrive in arbitrary chunks; complete lines are buffered into a frame
//! and a blank line dispatches it. Comment lines (`:` prefix) and unknown
//! fields are dropped. Frames with no `data:` line are never emitted.
//! A line longer than the limit is discarded along with its frame, so a
//! peer that never sends a newline cannot grow the buffer without bound.

use tracing::warn;

pub const DEFAULT_EVENT_TYPE: &str = "message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

impl SseFrame {
    pub fn message(data: impl Into<String>) -> Self {
        Self {
            event: DEFAULT_EVENT_TYPE.to_string(),
            data: data.into(),
            id: None,
        }
    }

    pub fn is_message(&self) -> bool {
        self.event == DEFAULT_EVENT_TYPE
    }
}

/// Longest single line accepted before it is discarded.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug)]
pub struct SseDecoder {
    buf: Vec<u8>,
    /// Prefix of `buf` already searched for a newline.
    scanned: usize,
    max_line: usize,
    /// Skipping the rest of an oversized line.
    discarding: bool,
    /// The current frame lost a line; drop it at dispatch.
    poisoned: bool,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            scanned: 0,
            max_line: MAX_LINE_BYTES,
            discarding: false,
            poisoned: false,
            event: None,
            data: Vec::new(),
            id: None,
        }
    }

    pub fn with_max_line(mut self, bytes: usize) -> Self {
        self.max_line = bytes;
        self
    }

    /// Feed a chunk; returns every frame completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut chunk = chunk;
        if self.discarding {
            match chunk.iter().position(|b| *b == b'\n') {
                Some(pos) => {
                    self.discarding = false;
                    chunk = &chunk[pos + 1..];
                }
                None => return Vec::new(),
            }
        }
        self.buf.extend_from_slice(chunk);

        let mut out = Vec::new();
        let mut start = 0;
        while let Some(rel) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') {
            let end = self.scanned + rel;
            self.scanned = end + 1;
            if end - start > self.max_line {
                self.drop_line(end - start);
                start = end + 1;
                continue;
            }
            let raw = &self.buf[start..end];
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            let line = String::from_utf8_lossy(raw).into_owned();
            start = end + 1;
            if let Some(frame) = self.line(&line) {
                out.push(frame);
            }
        }
        self.buf.drain(..start);
        self.scanned = self.buf.len();

        if self.buf.len() > self.max_line {
            self.drop_line(self.buf.len());
            self.buf.clear();
            self.scanned = 0;
            self.discarding = true;
        }
        out
    }

    fn drop_line(&mut self, len: usize) {
        warn!(
            target: "vigil",
            len,
            limit = self.max_line,
            "dropping oversized event-stream line"
        );
        self.poisoned = true;
    }

    fn line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        let id = self.id.take();
        if std::mem::take(&mut self.poisoned) {
            self.data.clear();
            return None;
        }
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame {
            event: event
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_string()),
            data,
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_message_frame() {
        let mut d = SseDecoder::new();
        let frames = d.push(b"data: {\"str\":\"x\"}\n\n");
        assert_eq!(frames, vec![SseFrame::message("{\"str\":\"x\"}")]);
    }

    #[test]
    fn frames_split_across_chunks() {
        let mut d = SseDecoder::new();
        assert!(d.push(b"event: mess").is_empty());
        assert!(d.push(b"age\r\ndata: a").is_empty());
        let frames = d.push(b"bc\r\n\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "message");
        assert_eq!(frames[0].data, "abc");
    }

    #[test]
    fn comments_and_heartbeats_are_skipped() {
        let mut d = SseDecoder::new();
        let frames = d.push(b": keepalive\n\nretry: 1000\n\n");
        assert!(frames.is_empty());
    }

    #[test]
    fn multi_line_data_and_custom_event() {
        let mut d = SseDecoder::new();
        let frames = d.push(b"event: ping\nid: 7\ndata: a\ndata: b\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "ping");
        assert!(!frames[0].is_message());
        assert_eq!(frames[0].data, "a\nb");
        assert_eq!(frames[0].id.as_deref(), Some("7"));
    }

    #[test]
    fn oversized_line_drops_its_frame_only() {
        let mut d = SseDecoder::new().with_max_line(16);
        let mut body = b"data: ok1\n\ndata: ".to_vec();
        body.extend(std::iter::repeat(b'x').take(64));
        body.extend_from_slice(b"\n\ndata: ok2\n\n");
        let data: Vec<_> = d.push(&body).into_iter().map(|f| f.data).collect();
        assert_eq!(data, vec!["ok1", "ok2"]);
    }

    #[test]
    fn oversized_line_across_chunks_is_not_buffered() {
        let mut d = SseDecoder::new().with_max_line(16);
        assert!(d.push(b"data: first\ndata: ").is_empty());
        for _ in 0..100 {
            assert!(d.push(b"yyyyyyyy").is_empty());
            assert!(d.buf.len() <= 16, "buffer grew to {}", d.buf.len());
        }
        assert!(d.push(b"yy\n\n").is_empty(), "frame with the long line is dropped");
        assert_eq!(d.push(b"data: next\n\n"), vec![SseFrame::message("next")]);
    }

    #[test]
    fn long_line_in_small_chunks_within_limit() {
        let mut d = SseDecoder::new();
        let payload = "z".repeat(10_000);
        let body = format!("data: {payload}\n\n");
        let mut frames = Vec::new();
        for piece in body.as_bytes().chunks(7) {
            frames.extend(d.push(piece));
            assert!(d.scanned <= d.buf.len());
        }
        assert_eq!(frames, vec![SseFrame::message(payload)]);
        assert!(d.buf.is_empty());
    }

    #[test]
    fn event_type_resets_between_frames() {
        let mut d = SseDecoder::new();
        let frames = d.push(b"event: ping\ndata: 1\n\ndata: 2\n\n");
        assert_eq!(frames[0].event, "ping");
        assert_eq!(frames[1].event, "message");
    }
}
