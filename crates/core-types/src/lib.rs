//! Shared contracts for the chat interceptor: the semantic message and
//! decision types plus the frame formats spoken on the wire.

use serde::{Deserialize, Serialize};

pub mod wire;

/// Label attached when the message was admitted because the circuit breaker
/// refused to invoke the scorer.
pub const LABEL_CIRCUIT_BREAKER_OPEN: &str = "circuit_breaker_open";
/// Label attached when the scorer itself failed and the message was admitted
/// unscored.
pub const LABEL_INTERCEPTOR_ERROR: &str = "interceptor_error";
/// Label attached when the length gate rejected the message before scanning.
pub const LABEL_MESSAGE_TOO_LONG: &str = "message_too_long";

/// An outgoing chat message as submitted by the messaging product.
///
/// Identifiers are opaque strings; `timestamp` is UTC ISO-8601. The id and
/// timestamp fields default to empty on the wire so that a sparse client
/// payload still reaches the content validation step instead of failing
/// deserialization.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub thread_id: String,
    #[serde(default)]
    pub user_id: String,
    pub content: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_lat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_lon: Option<f64>,
}

/// The synchronous decision taken for a message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterceptAction {
    Allow,
    Nudge,
    HardBlock,
}

/// Outcome of intercepting one message.
///
/// Invariants: `allowed == (action != HardBlock)`, `nudge_message` is present
/// iff the action is `Nudge`, `block_reason` is present iff the action is
/// `HardBlock`. Use the constructors; they cannot produce an inconsistent
/// record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterceptResult {
    pub allowed: bool,
    pub action: InterceptAction,
    pub risk_score: f64,
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nudge_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
}

impl InterceptResult {
    pub fn allow(risk_score: f64, labels: Vec<String>) -> Self {
        Self {
            allowed: true,
            action: InterceptAction::Allow,
            risk_score,
            labels,
            nudge_message: None,
            block_reason: None,
        }
    }

    pub fn nudge(risk_score: f64, labels: Vec<String>, nudge_message: impl Into<String>) -> Self {
        Self {
            allowed: true,
            action: InterceptAction::Nudge,
            risk_score,
            labels,
            nudge_message: Some(nudge_message.into()),
            block_reason: None,
        }
    }

    pub fn hard_block(risk_score: f64, labels: Vec<String>, block_reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            action: InterceptAction::HardBlock,
            risk_score,
            labels,
            nudge_message: None,
            block_reason: Some(block_reason.into()),
        }
    }

    /// Compact summary carried in the stream event, keeping only the fields
    /// downstream consumers key on.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "allowed": self.allowed,
            "action": self.action,
            "risk_score": self.risk_score,
            "labels": self.labels,
        })
    }
}
