//! Redis Streams implementation of the event sink.
//!
//! One long-lived connection, re-established by a dedicated task with
//! exponential backoff (1s doubling, capped at 10s). No offline queueing:
//! while disconnected, events are dropped with a warning.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cis_core_types::{ChatMessage, InterceptResult};
use redis::aio::ConnectionManager;
use redis::streams::StreamRangeReply;
use redis::AsyncCommands;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::StreamError;
use crate::event::stream_fields;
use crate::sink::{EventSink, StreamStats};

const BACKOFF_BASE_MS: u64 = 1_000;
const BACKOFF_CAP_MS: u64 = 10_000;

/// Id reported for an empty stream.
const EMPTY_STREAM_ID: &str = "0-0";

#[derive(Clone, Debug)]
pub struct StreamConfig {
    pub host: String,
    pub port: u16,
    pub stream_key: String,
}

impl StreamConfig {
    fn url(&self) -> String {
        format!("redis://{}:{}/", self.host, self.port)
    }
}

struct SinkShared {
    config: StreamConfig,
    connection: RwLock<Option<ConnectionManager>>,
    connected: AtomicBool,
    retry: Notify,
}

impl SinkShared {
    fn mark_disconnected(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.retry.notify_one();
        }
    }
}

pub struct RedisStreamSink {
    shared: Arc<SinkShared>,
    reconnect_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl RedisStreamSink {
    /// Spawn the sink and its reconnect task. Returns immediately; the first
    /// connection attempt happens in the background so service startup never
    /// waits on the backend.
    pub fn start(config: StreamConfig) -> Arc<Self> {
        let shared = Arc::new(SinkShared {
            config,
            connection: RwLock::new(None),
            connected: AtomicBool::new(false),
            retry: Notify::new(),
        });
        let task = tokio::spawn(reconnect_loop(Arc::clone(&shared)));
        Arc::new(Self {
            shared,
            reconnect_task: parking_lot::Mutex::new(Some(task)),
        })
    }
}

#[async_trait]
impl EventSink for RedisStreamSink {
    async fn emit(&self, message: &ChatMessage, result: &InterceptResult) {
        if !self.is_connected() {
            warn!(
                message_id = %message.message_id,
                "log backend disconnected; dropping intercept event"
            );
            return;
        }

        let manager = { self.shared.connection.read().await.clone() };
        let Some(manager) = manager else {
            warn!(
                message_id = %message.message_id,
                "log backend connection not ready; dropping intercept event"
            );
            return;
        };

        let fields = stream_fields(message, result);
        let mut conn = manager;
        match conn
            .xadd::<_, _, _, _, String>(&self.shared.config.stream_key, "*", &fields)
            .await
        {
            Ok(id) => {
                debug!(message_id = %message.message_id, stream_id = %id, "intercept event appended");
            }
            Err(err) => {
                warn!(
                    message_id = %message.message_id,
                    error = %err,
                    "failed to append intercept event; dropping"
                );
                self.shared.mark_disconnected();
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    async fn stats(&self) -> Option<StreamStats> {
        if !self.is_connected() {
            return None;
        }
        let manager = { self.shared.connection.read().await.clone() }?;
        let key = &self.shared.config.stream_key;

        let mut conn = manager;
        let length: u64 = match conn.xlen(key).await {
            Ok(length) => length,
            Err(err) => {
                warn!(error = %err, "stream length read failed");
                self.shared.mark_disconnected();
                return None;
            }
        };
        let last: StreamRangeReply = match conn.xrevrange_count(key, "+", "-", 1).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(error = %err, "stream tail read failed");
                self.shared.mark_disconnected();
                return None;
            }
        };
        let last_id = last
            .ids
            .first()
            .map(|entry| entry.id.clone())
            .unwrap_or_else(|| EMPTY_STREAM_ID.to_string());

        Some(StreamStats { length, last_id })
    }

    async fn shutdown(&self) {
        if let Some(task) = self.reconnect_task.lock().take() {
            task.abort();
        }
        *self.shared.connection.write().await = None;
        self.shared.connected.store(false, Ordering::SeqCst);
        info!("event stream sink shut down");
    }
}

async fn reconnect_loop(shared: Arc<SinkShared>) {
    loop {
        let mut attempt: u32 = 0;
        while !shared.connected.load(Ordering::SeqCst) {
            match connect(&shared.config).await {
                Ok(manager) => {
                    *shared.connection.write().await = Some(manager);
                    shared.connected.store(true, Ordering::SeqCst);
                    info!(
                        stream = %shared.config.stream_key,
                        backend = %shared.config.url(),
                        "log backend connected"
                    );
                }
                Err(err) => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        backend = %shared.config.url(),
                        error = %err,
                        retry_in_ms = delay.as_millis() as u64,
                        "log backend unreachable"
                    );
                    attempt = attempt.saturating_add(1);
                    tokio::time::sleep(delay).await;
                }
            }
        }
        // Parked until an append or stats failure flips the flag.
        shared.retry.notified().await;
    }
}

async fn connect(config: &StreamConfig) -> Result<ConnectionManager, StreamError> {
    let client = redis::Client::open(config.url())
        .map_err(|err| StreamError::Unavailable(err.to_string()))?;
    let mut manager = ConnectionManager::new(client)
        .await
        .map_err(|err| StreamError::Unavailable(err.to_string()))?;
    redis::cmd("PING")
        .query_async::<_, String>(&mut manager)
        .await
        .map_err(|err| StreamError::Unavailable(err.to_string()))?;
    Ok(manager)
}

fn backoff_delay(attempt: u32) -> Duration {
    let exp = 1u64 << attempt.min(10);
    Duration::from_millis((exp * BACKOFF_BASE_MS).min(BACKOFF_CAP_MS))
}
