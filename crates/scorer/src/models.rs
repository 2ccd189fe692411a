use serde::{Deserialize, Serialize};

/// At most this many raw substrings are retained per category.
pub const MAX_SAMPLES: usize = 3;

/// The fixed v1 pattern taxonomy. Order of `ALL` is the canonical pipeline
/// order and drives label ordering in results.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Phone,
    Email,
    Url,
    Social,
    Obfuscation,
}

impl PatternKind {
    pub const ALL: [PatternKind; 5] = [
        PatternKind::Phone,
        PatternKind::Email,
        PatternKind::Url,
        PatternKind::Social,
        PatternKind::Obfuscation,
    ];

    /// Per-category score contribution weight.
    pub fn weight(self) -> f64 {
        match self {
            PatternKind::Phone => 0.85,
            PatternKind::Email => 0.80,
            PatternKind::Url => 0.50,
            PatternKind::Social => 0.40,
            PatternKind::Obfuscation => 0.15,
        }
    }

    /// Label carried on results and stream events.
    pub fn label(self) -> &'static str {
        match self {
            PatternKind::Phone => "contact_info_phone",
            PatternKind::Email => "contact_info_email",
            PatternKind::Url => "external_link",
            PatternKind::Social => "social_platform_mention",
            PatternKind::Obfuscation => "obfuscation_detected",
        }
    }

    /// Phrase used when listing categories in a block reason.
    pub fn human_phrase(self) -> &'static str {
        match self {
            PatternKind::Phone => "a phone number",
            PatternKind::Email => "an email address",
            PatternKind::Url => "an external link",
            PatternKind::Social => "a social media handle",
            PatternKind::Obfuscation => "disguised contact details",
        }
    }

    /// Ordering used to pick nudge copy; higher wins.
    pub fn severity(self) -> u8 {
        match self {
            PatternKind::Phone => 4,
            PatternKind::Email => 3,
            PatternKind::Social => 2,
            PatternKind::Url => 1,
            PatternKind::Obfuscation => 0,
        }
    }
}

/// All hits for one category, collapsed by set-dedup on the trimmed
/// substring: repeated substrings count once.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatternMatch {
    pub kind: PatternKind,
    pub count: usize,
    pub samples: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_are_the_v1_taxonomy() {
        assert_eq!(PatternKind::Phone.weight(), 0.85);
        assert_eq!(PatternKind::Email.weight(), 0.80);
        assert_eq!(PatternKind::Url.weight(), 0.50);
        assert_eq!(PatternKind::Social.weight(), 0.40);
        assert_eq!(PatternKind::Obfuscation.weight(), 0.15);
    }

    #[test]
    fn contact_categories_outrank_the_rest_for_nudge_copy() {
        assert!(PatternKind::Phone.severity() > PatternKind::Social.severity());
        assert!(PatternKind::Email.severity() > PatternKind::Social.severity());
        assert!(PatternKind::Social.severity() > PatternKind::Url.severity());
    }
}
