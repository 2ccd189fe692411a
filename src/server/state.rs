use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use cis_event_stream::EventSink;
use cis_scorer::ScorePolicy;

use crate::breaker::CircuitBreaker;
use crate::config::InterceptorConfig;

/// Shared handles for both listeners. Cheap to clone; everything mutable is
/// behind its own synchronization.
#[derive(Clone)]
pub struct ServeState {
    inner: Arc<StateInner>,
}

struct StateInner {
    config: Arc<InterceptorConfig>,
    breaker: Arc<CircuitBreaker>,
    sink: Arc<dyn EventSink>,
    active_connections: AtomicUsize,
    ws_ready: AtomicBool,
}

impl ServeState {
    pub fn new(
        config: Arc<InterceptorConfig>,
        breaker: Arc<CircuitBreaker>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            inner: Arc::new(StateInner {
                config,
                breaker,
                sink,
                active_connections: AtomicUsize::new(0),
                ws_ready: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &InterceptorConfig {
        &self.inner.config
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.inner.breaker
    }

    pub fn sink(&self) -> &Arc<dyn EventSink> {
        &self.inner.sink
    }

    pub fn score_policy(&self) -> ScorePolicy {
        ScorePolicy {
            sync_threshold: self.inner.config.sync_threshold,
            max_message_length: self.inner.config.max_message_length,
        }
    }

    pub fn connection_opened(&self) -> usize {
        self.inner.active_connections.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn connection_closed(&self) {
        self.inner.active_connections.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn active_connections(&self) -> usize {
        self.inner.active_connections.load(Ordering::SeqCst)
    }

    pub fn mark_ws_ready(&self) {
        self.inner.ws_ready.store(true, Ordering::SeqCst);
    }

    pub fn ws_ready(&self) -> bool {
        self.inner.ws_ready.load(Ordering::SeqCst)
    }
}
