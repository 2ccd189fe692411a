//! Stage-1 risk scorer: a pure, deterministic pass over message content.
//!
//! The scorer scans for a fixed taxonomy of contact-sharing patterns (phone,
//! email, url, social, obfuscation), aggregates the matches into a normalized
//! risk score in [0, 1], and derives the user-facing decision. Deeper stages
//! (NLP, behavioral) live downstream and consume the same messages from the
//! event stream; nothing here performs I/O or keeps state.

pub mod decision;
pub mod models;
pub mod patterns;
pub mod score;

pub use decision::{assess, ScorePolicy, NUDGE_THRESHOLD};
pub use models::{PatternKind, PatternMatch, MAX_SAMPLES};
pub use score::{aggregate, scan};
