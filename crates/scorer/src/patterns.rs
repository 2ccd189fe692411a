//! The v1 regex taxonomy. Each category is a set of expressions; hits from
//! every expression in a set are unioned before scoring. The sets are
//! compiled once per process.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::PatternKind;

pub struct PatternSet {
    pub kind: PatternKind,
    pub regexes: Vec<Regex>,
}

/// Category sets in canonical pipeline order.
pub static LIBRARY: Lazy<Vec<PatternSet>> = Lazy::new(|| {
    vec![
        PatternSet {
            kind: PatternKind::Phone,
            regexes: vec![
                // International: +/00 prefix, country code, grouped digits.
                Regex::new(r"(?:\+|00)\d{1,3}[\s.-]?\d{1,4}[\s.-]?\d{1,4}[\s.-]?\d{1,9}").unwrap(),
                // US grouped: (555) 123-4567, 555.123.4567, 555 123 4567.
                Regex::new(r"\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}").unwrap(),
                // Condensed run of digits standing alone.
                Regex::new(r"\b\d{10,15}\b").unwrap(),
            ],
        },
        PatternSet {
            kind: PatternKind::Email,
            regexes: vec![
                Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap(),
                // Spoken form: user (at) domain (dot) tld, parens optional.
                Regex::new(
                    r"(?i)\b[a-z0-9._%+-]+\s*\(?\s*at\s*\)?\s*[a-z0-9-]+\s*\(?\s*dot\s*\)?\s*[a-z]{2,}\b",
                )
                .unwrap(),
                // Letters spaced out around the @ sign.
                Regex::new(r"(?:[A-Za-z0-9]\s+){2,}@\s*(?:[A-Za-z0-9]\s*){3,}").unwrap(),
            ],
        },
        PatternSet {
            kind: PatternKind::Url,
            regexes: vec![
                Regex::new(r"https?://\S+").unwrap(),
                Regex::new(r"\bwww\.\S+").unwrap(),
                // Known shorteners only count with a path segment.
                Regex::new(r"(?i)\b(?:bit\.ly|tinyurl\.com|goo\.gl|t\.co|short\.link)/\S+")
                    .unwrap(),
            ],
        },
        PatternSet {
            kind: PatternKind::Social,
            regexes: vec![
                Regex::new(
                    r"(?i)\b(?:whatsapp|telegram|snapchat|snap|insta|instagram|discord|kik|signal)\b",
                )
                .unwrap(),
                Regex::new(r"(?i)\bdm\s+me\b").unwrap(),
                Regex::new(r"(?i)\btext\s+me\b").unwrap(),
                Regex::new(r"(?i)\bcontact\s+(?:me|us)\s+(?:at|on)\b").unwrap(),
            ],
        },
        PatternSet {
            kind: PatternKind::Obfuscation,
            regexes: vec![
                // Alphanumerics pushed apart by runs of whitespace.
                Regex::new(r"[A-Za-z0-9]\s{2,}[A-Za-z0-9]").unwrap(),
                // Explicit (at)/(dot) cue.
                Regex::new(r"(?i)\(\s*at\s*\)|\(\s*dot\s*\)").unwrap(),
                // Spelled-out digits.
                Regex::new(r"(?i)\b(?:zero|one|two|three|four|five|six|seven|eight|nine)\b")
                    .unwrap(),
            ],
        },
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    fn set(kind: PatternKind) -> &'static PatternSet {
        LIBRARY.iter().find(|set| set.kind == kind).unwrap()
    }

    fn hits(kind: PatternKind, text: &str) -> bool {
        set(kind).regexes.iter().any(|re| re.is_match(text))
    }

    #[test]
    fn library_covers_every_category_in_order() {
        let kinds: Vec<PatternKind> = LIBRARY.iter().map(|set| set.kind).collect();
        assert_eq!(kinds, PatternKind::ALL);
    }

    #[test]
    fn phone_formats() {
        assert!(hits(PatternKind::Phone, "+1 555 123 4567"));
        assert!(hits(PatternKind::Phone, "0044 20 7946 0958"));
        assert!(hits(PatternKind::Phone, "(555) 123-4567"));
        assert!(hits(PatternKind::Phone, "call 5551234567 now"));
        assert!(!hits(PatternKind::Phone, "room 123"));
    }

    #[test]
    fn email_formats() {
        assert!(hits(PatternKind::Email, "john.doe@example.com"));
        assert!(hits(PatternKind::Email, "john (at) example (dot) com"));
        assert!(hits(PatternKind::Email, "john at example dot com"));
        assert!(hits(PatternKind::Email, "j o h n @ g m a i l . c o m"));
        assert!(!hits(PatternKind::Email, "meet me at noon"));
    }

    #[test]
    fn url_formats() {
        assert!(hits(PatternKind::Url, "https://example.com/profile"));
        assert!(hits(PatternKind::Url, "visit www.example.com today"));
        assert!(hits(PatternKind::Url, "bit.ly/abc123"));
        // A bare shortener host with no path is not a link share.
        assert!(!hits(PatternKind::Url, "I shortened it with bit.ly yesterday"));
    }

    #[test]
    fn social_mentions_and_phrases() {
        assert!(hits(PatternKind::Social, "add me on WhatsApp"));
        assert!(hits(PatternKind::Social, "my insta is cool"));
        assert!(hits(PatternKind::Social, "DM me"));
        assert!(hits(PatternKind::Social, "text me later"));
        assert!(hits(PatternKind::Social, "contact us on the app"));
        assert!(!hits(PatternKind::Social, "instant noodles"));
    }

    #[test]
    fn obfuscation_cues() {
        assert!(hits(PatternKind::Obfuscation, "5  5  5"));
        assert!(hits(PatternKind::Obfuscation, "john (at) example"));
        assert!(hits(PatternKind::Obfuscation, "five five five one two"));
        assert!(!hits(PatternKind::Obfuscation, "a normal sentence"));
    }
}
