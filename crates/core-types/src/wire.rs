//! Frame formats exchanged over the persistent client connection.
//!
//! One JSON object per text frame. Inbound frames carry a `type`
//! discriminator; the dispatcher inspects it before deserializing so that an
//! unknown type yields a protocol error rather than a parse error.

use serde::{Deserialize, Serialize};

use crate::{ChatMessage, InterceptResult};

pub const FRAME_INTERCEPT: &str = "intercept";
pub const FRAME_INTERCEPT_RESULT: &str = "intercept_result";
pub const FRAME_ERROR: &str = "error";

/// Inbound `{"type": "intercept", ...}` frame.
#[derive(Clone, Debug, Deserialize)]
pub struct InterceptorRequest {
    pub message: ChatMessage,
    #[serde(default)]
    pub request_id: Option<String>,
}

/// Outbound decision frame, echoing (or minting) the request id.
#[derive(Clone, Debug, Serialize)]
pub struct InterceptorResponse {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub request_id: String,
    pub result: InterceptResult,
    pub processing_ms: u64,
}

impl InterceptorResponse {
    pub fn new(request_id: String, result: InterceptResult, processing_ms: u64) -> Self {
        Self {
            kind: FRAME_INTERCEPT_RESULT,
            request_id,
            result,
            processing_ms,
        }
    }
}

/// Outbound protocol error frame. `request_id` is present only when it could
/// be recovered from the offending frame.
#[derive(Clone, Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub error: &'static str,
    pub message: String,
}

impl ErrorResponse {
    pub fn processing_error(request_id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            kind: FRAME_ERROR,
            request_id,
            error: "processing_error",
            message: message.into(),
        }
    }
}
