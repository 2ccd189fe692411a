//! Append-only publication of intercept events.
//!
//! Every intercepted message, allowed or blocked, is appended to a backend
//! stream for the downstream analysis pipeline. Delivery is at-least-once
//! and never blocks the response path: when the backend is unreachable the
//! event is dropped with a warning. Consumers dedup on `message_id`.

pub mod errors;
pub mod event;
pub mod redis;
pub mod sink;

pub use self::errors::StreamError;
pub use self::event::stream_fields;
pub use self::redis::{RedisStreamSink, StreamConfig};
pub use self::sink::{emit_detached, EventSink, NoopSink, StreamStats};
