//! The sink seam between the dispatcher and the log backend.

use std::sync::Arc;

use async_trait::async_trait;
use cis_core_types::{ChatMessage, InterceptResult};
use serde::Serialize;
use tracing::debug;

/// Read-side snapshot of the backend stream, surfaced on the metrics
/// endpoint.
#[derive(Clone, Debug, Serialize)]
pub struct StreamStats {
    pub length: u64,
    pub last_id: String,
}

/// Destination for intercept events.
///
/// `emit` is fail-open by contract: delivery problems are logged and
/// swallowed, never surfaced to the request path. Delivery is at-least-once;
/// consumers dedup on `message_id`.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Append one event, dropping it with a warning when the backend is
    /// unreachable.
    async fn emit(&self, message: &ChatMessage, result: &InterceptResult);

    fn is_connected(&self) -> bool;

    /// Current stream length and last assigned id; `None` while disconnected.
    async fn stats(&self) -> Option<StreamStats>;

    /// Best-effort teardown: stop reconnecting and drop the connection.
    async fn shutdown(&self);
}

/// Fire-and-forget variant of [`EventSink::emit`]: hands the event to a
/// background task so the response write is never suspended behind the
/// backend.
pub fn emit_detached(sink: &Arc<dyn EventSink>, message: &ChatMessage, result: &InterceptResult) {
    let sink = Arc::clone(sink);
    let message = message.clone();
    let result = result.clone();
    tokio::spawn(async move {
        sink.emit(&message, &result).await;
    });
}

/// Sink that drops everything; stands in for the backend in tests.
#[derive(Default)]
pub struct NoopSink;

#[async_trait]
impl EventSink for NoopSink {
    async fn emit(&self, message: &ChatMessage, _result: &InterceptResult) {
        debug!(message_id = %message.message_id, "noop sink dropped intercept event");
    }

    fn is_connected(&self) -> bool {
        false
    }

    async fn stats(&self) -> Option<StreamStats> {
        None
    }

    async fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_sink_reports_disconnected() {
        let sink = NoopSink;
        assert!(!sink.is_connected());
        assert!(sink.stats().await.is_none());
        sink.emit(&ChatMessage::default(), &InterceptResult::allow(0.0, vec![]))
            .await;
    }

    #[tokio::test]
    async fn detached_emit_does_not_panic_the_caller() {
        let sink: Arc<dyn EventSink> = Arc::new(NoopSink);
        emit_detached(
            &sink,
            &ChatMessage::default(),
            &InterceptResult::allow(0.0, vec![]),
        );
        tokio::task::yield_now().await;
    }
}
