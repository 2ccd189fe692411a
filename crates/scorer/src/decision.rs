//! Turns a scan into the user-facing intercept decision.

use cis_core_types::{InterceptResult, LABEL_MESSAGE_TOO_LONG};

use crate::models::{PatternKind, PatternMatch};
use crate::score::{aggregate, scan};

/// Scores at or above this band (and below the hard-block threshold) return
/// the message with a warning instead of blocking it.
pub const NUDGE_THRESHOLD: f64 = 0.40;

const GENERIC_BLOCK_REASON: &str =
    "This message violates our community guidelines. Keep conversations on the platform for your safety.";
const NUDGE_CONTACT: &str =
    "Sharing personal contact information may violate platform policies and makes it harder for us to protect you.";
const NUDGE_OFF_PLATFORM: &str =
    "We noticed you're trying to move the conversation off-platform. Keeping chats here protects you if anything goes wrong.";
const NUDGE_GENERIC: &str =
    "Please keep our community guidelines in mind when sharing links or contact details.";

/// Tunables owned by the service configuration.
#[derive(Clone, Debug)]
pub struct ScorePolicy {
    /// Risk score at and above which the message is hard-blocked.
    pub sync_threshold: f64,
    /// Content longer than this is blocked before scanning.
    pub max_message_length: usize,
}

impl Default for ScorePolicy {
    fn default() -> Self {
        Self {
            sync_threshold: 0.65,
            max_message_length: 10_000,
        }
    }
}

/// Score one message body and derive the decision. Pure and deterministic:
/// identical content and policy always yield an identical result.
pub fn assess(content: &str, policy: &ScorePolicy) -> InterceptResult {
    if content.chars().count() > policy.max_message_length {
        return InterceptResult::hard_block(
            1.0,
            vec![LABEL_MESSAGE_TOO_LONG.to_string()],
            format!(
                "Message exceeds the maximum length of {} characters.",
                policy.max_message_length
            ),
        );
    }

    let matches = scan(content);
    let score = aggregate(&matches);
    let labels: Vec<String> = matches.iter().map(|m| m.kind.label().to_string()).collect();

    if score >= policy.sync_threshold {
        InterceptResult::hard_block(score, labels, block_reason(&matches))
    } else if score >= NUDGE_THRESHOLD {
        InterceptResult::nudge(score, labels, nudge_copy(&matches))
    } else {
        InterceptResult::allow(score, labels)
    }
}

fn block_reason(matches: &[PatternMatch]) -> String {
    if matches.is_empty() {
        return GENERIC_BLOCK_REASON.to_string();
    }
    let listed = matches
        .iter()
        .map(|m| m.kind.human_phrase())
        .collect::<Vec<_>>()
        .join(", ");
    format!("Your message appears to share {listed}. Keep conversations on the platform for your safety.")
}

fn nudge_copy(matches: &[PatternMatch]) -> String {
    let dominant = matches
        .iter()
        .max_by_key(|m| m.kind.severity())
        .map(|m| m.kind);
    match dominant {
        Some(PatternKind::Phone) | Some(PatternKind::Email) => NUDGE_CONTACT,
        Some(PatternKind::Social) => NUDGE_OFF_PLATFORM,
        _ => NUDGE_GENERIC,
    }
    .to_string()
}
