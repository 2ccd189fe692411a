//! The interceptor service: a WebSocket listener for the synchronous decide
//! path and a second HTTP listener for health and metrics.

mod dispatch;
mod router;
mod state;
mod ws;

use std::future::IntoFuture;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use cis_event_stream::{EventSink, RedisStreamSink, StreamConfig};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

pub use state::ServeState;

use crate::breaker::{BreakerPolicy, CircuitBreaker};
use crate::config::InterceptorConfig;

pub async fn run(config: Arc<InterceptorConfig>) -> Result<()> {
    let sink: Arc<dyn EventSink> = RedisStreamSink::start(StreamConfig {
        host: config.redis_host.clone(),
        port: config.redis_port,
        stream_key: config.message_stream_key.clone(),
    });
    let breaker = Arc::new(CircuitBreaker::new(BreakerPolicy {
        failure_threshold: config.circuit_breaker_threshold,
        reset_timeout: std::time::Duration::from_millis(config.circuit_breaker_reset_ms),
        half_open_max_attempts: config.circuit_breaker_half_open_max,
    }));
    let state = ServeState::new(Arc::clone(&config), breaker, Arc::clone(&sink));

    let primary: Router = ws::router().with_state(state.clone());
    let ops: Router = router::router().with_state(state.clone());

    let ws_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.ws_port));
    let ws_listener = TcpListener::bind(ws_addr)
        .await
        .with_context(|| format!("failed to bind websocket listener on {ws_addr}"))?;
    let health_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.health_port));
    let health_listener = TcpListener::bind(health_addr)
        .await
        .with_context(|| format!("failed to bind health listener on {health_addr}"))?;

    arm_fault_injection();

    state.mark_ws_ready();
    info!(port = config.ws_port, "interceptor websocket listening");
    info!(port = config.health_port, "health and metrics listening");
    info!(
        threshold = config.sync_threshold,
        max_length = config.max_message_length,
        stream = %config.message_stream_key,
        detector = %format!("{}:{}", config.detection_host, config.detection_port),
        "interceptor ready"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let ws_server = axum::serve(ws_listener, primary.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()));
    let ops_server = axum::serve(health_listener, ops.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx));

    tokio::try_join!(ws_server.into_future(), ops_server.into_future())
        .context("server exited unexpectedly")?;

    sink.shutdown().await;
    info!("interceptor stopped");
    Ok(())
}

/// Operational self-test: when `CIS_FAULT_PANIC_MS` is set, panic a
/// background task after that many milliseconds. The fatal hook must take
/// the whole process down with exit code 1; anything else is a gap in the
/// crash policy.
fn arm_fault_injection() {
    let Ok(raw) = std::env::var("CIS_FAULT_PANIC_MS") else {
        return;
    };
    match raw.trim().parse::<u64>() {
        Ok(delay_ms) => {
            warn!(delay_ms, "fault injection armed; a background task will panic");
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                panic!("injected fault after {delay_ms}ms");
            });
        }
        Err(err) => {
            warn!(value = %raw, error = %err, "ignoring unparseable CIS_FAULT_PANIC_MS");
        }
    }
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    // Resolves on the single `true` send; a closed channel also releases.
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
