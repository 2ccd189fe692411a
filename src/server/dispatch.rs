//! Per-frame request handling: parse, validate, score under the breaker,
//! emit, respond.
//!
//! Every fail path past frame validation still produces a normal response;
//! the interceptor prefers delivering a permissive decision over delivering
//! no decision.

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use cis_core_types::wire::{ErrorResponse, InterceptorRequest, InterceptorResponse, FRAME_INTERCEPT};
use cis_core_types::{InterceptResult, LABEL_CIRCUIT_BREAKER_OPEN, LABEL_INTERCEPTOR_ERROR};
use cis_event_stream::emit_detached;
use cis_scorer::assess;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::breaker::Guarded;
use crate::server::state::ServeState;

const PARSE_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug, Error)]
#[error("stage-1 scorer panicked")]
struct ScorerFailed;

/// Handle one inbound text frame, returning the outbound frame when one
/// should be written.
pub(crate) async fn handle_frame(state: &ServeState, raw: &str) -> Option<String> {
    let started = Instant::now();

    let value: Value = match serde_json::from_str(raw) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) | Err(_) => {
            warn!("unparseable frame");
            return Some(error_frame(None, PARSE_ERROR_MESSAGE));
        }
    };
    let request_id_hint = value
        .get("request_id")
        .and_then(Value::as_str)
        .map(str::to_string);

    match value.get("type").and_then(Value::as_str) {
        Some(FRAME_INTERCEPT) => {}
        Some("ping") => return Some(serde_json::json!({ "type": "pong" }).to_string()),
        other => {
            warn!(frame_type = other.unwrap_or("<missing>"), "unsupported frame type");
            return Some(error_frame(
                request_id_hint,
                format!(
                    "Unsupported request type: {}",
                    other.unwrap_or("<missing>")
                ),
            ));
        }
    }

    if !value
        .pointer("/message/content")
        .map_or(false, Value::is_string)
    {
        return Some(error_frame(request_id_hint, "Message content is required"));
    }

    let request: InterceptorRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "malformed intercept request");
            return Some(error_frame(request_id_hint, PARSE_ERROR_MESSAGE));
        }
    };
    let request_id = request
        .request_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let message = request.message;

    let policy = state.score_policy();
    let outcome = state
        .breaker()
        .run(|| async {
            // Contain a scorer panic at this boundary: the fatal hook stands
            // down, the failure counts against the breaker, and the message
            // is admitted unscored.
            std::panic::catch_unwind(AssertUnwindSafe(|| {
                crate::fatal::contained(|| assess(&message.content, &policy))
            }))
            .map_err(|_| ScorerFailed)
        })
        .await;

    let result = resolve_outcome(outcome, &message.message_id);

    emit_detached(state.sink(), &message, &result);

    let response = InterceptorResponse::new(
        request_id,
        result,
        started.elapsed().as_millis() as u64,
    );
    match serde_json::to_string(&response) {
        Ok(frame) => Some(frame),
        Err(err) => {
            error!(error = %err, "failed to serialize response frame");
            Some(error_frame(Some(response.request_id), PARSE_ERROR_MESSAGE))
        }
    }
}

/// Map the guarded scorer outcome to a decision, failing open on both the
/// sentinel and a scorer error.
fn resolve_outcome(
    outcome: Result<Guarded<InterceptResult>, ScorerFailed>,
    message_id: &str,
) -> InterceptResult {
    match outcome {
        Ok(Guarded::Ran(result)) => result,
        Ok(Guarded::Rejected) => {
            debug!(message_id, "circuit open; admitting message unscored");
            InterceptResult::allow(0.0, vec![LABEL_CIRCUIT_BREAKER_OPEN.to_string()])
        }
        Err(err) => {
            error!(message_id, error = %err, "scorer failed; admitting message unscored");
            InterceptResult::allow(0.0, vec![LABEL_INTERCEPTOR_ERROR.to_string()])
        }
    }
}

fn error_frame(request_id: Option<String>, message: impl Into<String>) -> String {
    let error = ErrorResponse::processing_error(request_id, message);
    serde_json::to_string(&error).unwrap_or_else(|_| {
        // A struct of strings cannot fail to serialize; keep the protocol
        // alive anyway.
        r#"{"type":"error","error":"processing_error","message":"Internal server error"}"#
            .to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use cis_event_stream::{EventSink, NoopSink};

    use crate::breaker::{BreakerPolicy, CircuitBreaker};
    use crate::config::InterceptorConfig;

    fn test_config() -> Arc<InterceptorConfig> {
        Arc::new(InterceptorConfig {
            sync_threshold: 0.65,
            max_message_length: 10_000,
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_ms: 30_000,
            circuit_breaker_half_open_max: 1,
            redis_host: "localhost".into(),
            redis_port: 6379,
            message_stream_key: "cis:messages".into(),
            detection_host: "localhost".into(),
            detection_port: 8001,
            ws_port: 8080,
            health_port: 8081,
        })
    }

    fn test_state() -> ServeState {
        let sink: Arc<dyn EventSink> = Arc::new(NoopSink);
        ServeState::new(
            test_config(),
            Arc::new(CircuitBreaker::new(BreakerPolicy::default())),
            sink,
        )
    }

    async fn frame(state: &ServeState, raw: &str) -> Value {
        let reply = handle_frame(state, raw).await.expect("reply frame");
        serde_json::from_str(&reply).expect("reply is json")
    }

    #[tokio::test]
    async fn clean_message_is_allowed() {
        let state = test_state();
        let reply = frame(
            &state,
            r#"{"type":"intercept","request_id":"req-9","message":{"message_id":"m1","thread_id":"t1","user_id":"u1","content":"hello there","timestamp":"2025-06-01T12:00:00Z"}}"#,
        )
        .await;
        assert_eq!(reply["type"], "intercept_result");
        assert_eq!(reply["request_id"], "req-9");
        assert_eq!(reply["result"]["action"], "allow");
        assert_eq!(reply["result"]["allowed"], true);
        assert!(reply["processing_ms"].as_u64().is_some());
    }

    #[tokio::test]
    async fn phone_number_is_blocked() {
        let state = test_state();
        let reply = frame(
            &state,
            r#"{"type":"intercept","message":{"content":"Call me at (555) 123-4567"}}"#,
        )
        .await;
        assert_eq!(reply["result"]["action"], "hard_block");
        assert_eq!(reply["result"]["allowed"], false);
        assert!(reply["result"]["risk_score"].as_f64().unwrap() >= 0.65);
    }

    #[tokio::test]
    async fn missing_request_id_is_minted() {
        let state = test_state();
        let reply = frame(&state, r#"{"type":"intercept","message":{"content":"hi"}}"#).await;
        let minted = reply["request_id"].as_str().unwrap();
        assert!(Uuid::parse_str(minted).is_ok());
    }

    #[tokio::test]
    async fn garbage_yields_a_parse_error_without_request_id() {
        let state = test_state();
        let reply = frame(&state, "{not json").await;
        assert_eq!(reply["type"], "error");
        assert_eq!(reply["error"], "processing_error");
        assert_eq!(reply["message"], "Internal server error");
        assert!(reply.get("request_id").is_none());
    }

    #[tokio::test]
    async fn non_object_frames_count_as_parse_failures() {
        let state = test_state();
        let reply = frame(&state, "42").await;
        assert_eq!(reply["type"], "error");
    }

    #[tokio::test]
    async fn unknown_type_is_a_protocol_error() {
        let state = test_state();
        let reply = frame(
            &state,
            r#"{"type":"inspect","request_id":"r1","message":{"content":"hi"}}"#,
        )
        .await;
        assert_eq!(reply["type"], "error");
        assert_eq!(reply["request_id"], "r1");
        assert!(reply["message"].as_str().unwrap().contains("inspect"));
    }

    #[tokio::test]
    async fn missing_content_is_a_protocol_error() {
        let state = test_state();
        let reply = frame(
            &state,
            r#"{"type":"intercept","message":{"message_id":"m1"}}"#,
        )
        .await;
        assert_eq!(reply["type"], "error");
        assert_eq!(reply["message"], "Message content is required");
    }

    #[tokio::test]
    async fn ping_gets_a_pong() {
        let state = test_state();
        let reply = frame(&state, r#"{"type":"ping"}"#).await;
        assert_eq!(reply["type"], "pong");
    }

    #[test]
    fn scorer_failure_fails_open_with_label() {
        let result = resolve_outcome(Err(ScorerFailed), "m1");
        assert!(result.allowed);
        assert_eq!(result.risk_score, 0.0);
        assert_eq!(result.labels, vec![LABEL_INTERCEPTOR_ERROR]);
    }

    #[test]
    fn breaker_sentinel_fails_open_with_label() {
        let result = resolve_outcome(Ok(Guarded::Rejected), "m1");
        assert!(result.allowed);
        assert_eq!(result.labels, vec![LABEL_CIRCUIT_BREAKER_OPEN]);
    }

    #[tokio::test]
    async fn open_breaker_fails_open_with_label() {
        let sink: Arc<dyn EventSink> = Arc::new(NoopSink);
        let breaker = Arc::new(CircuitBreaker::new(BreakerPolicy {
            failure_threshold: 1,
            reset_timeout: Duration::from_secs(60),
            half_open_max_attempts: 1,
        }));
        let state = ServeState::new(test_config(), Arc::clone(&breaker), sink);

        #[derive(Debug)]
        struct Down;
        let tripped: Result<Guarded<()>, Down> = breaker.run(|| async { Err(Down) }).await;
        assert!(tripped.is_err());

        let reply = frame(
            &state,
            r#"{"type":"intercept","message":{"content":"Call me at (555) 123-4567"}}"#,
        )
        .await;
        assert_eq!(reply["result"]["action"], "allow");
        assert_eq!(reply["result"]["allowed"], true);
        assert_eq!(reply["result"]["risk_score"], 0.0);
        assert_eq!(reply["result"]["labels"][0], "circuit_breaker_open");
    }
}
