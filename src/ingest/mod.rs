// src/ingest/mod.rs
//! Founding feed ingestion: SSE decoding, event parsing/validation, and the
//! long-lived consumer loop.

pub mod consumer;
pub mod markup;
pub mod sse;
pub mod transport;
pub mod types;
pub mod validate;

pub use consumer::{ConsumerState, FrameOutcome, StreamConsumer};
pub use transport::{FeedTransport, FrameStream, HttpFeed};
pub use types::{ExtractedEvent, RawEvent, Rejection, Verb};
pub use validate::is_valid;
