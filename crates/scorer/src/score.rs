//! Scanning and score aggregation.

use std::collections::HashSet;

use crate::models::{PatternMatch, MAX_SAMPLES};
use crate::patterns::LIBRARY;

/// Scan content against every category set. Hits within a category are
/// deduplicated on the trimmed substring; at most one `PatternMatch` per
/// category is produced, in canonical order.
pub fn scan(content: &str) -> Vec<PatternMatch> {
    let mut matches = Vec::new();
    for set in LIBRARY.iter() {
        let mut seen: HashSet<String> = HashSet::new();
        let mut samples = Vec::new();
        for regex in &set.regexes {
            for hit in regex.find_iter(content) {
                let trimmed = hit.as_str().trim();
                if trimmed.is_empty() {
                    continue;
                }
                if seen.insert(trimmed.to_string()) && samples.len() < MAX_SAMPLES {
                    samples.push(trimmed.to_string());
                }
            }
        }
        if !seen.is_empty() {
            matches.push(PatternMatch {
                kind: set.kind,
                count: seen.len(),
                samples,
            });
        }
    }
    matches
}

/// Collapse category matches into a normalized risk score.
///
/// The score is the larger of two views of the evidence, plus a small boost
/// when several categories fire at once: the strongest single category
/// (damped by 0.85) keeps one clear phone or email above the block band,
/// while the damped sum of contributions (per-category count capped at 3)
/// lets accumulations of weaker signals climb without a lone medium signal
/// reaching a block on its own.
pub fn aggregate(matches: &[PatternMatch]) -> f64 {
    if matches.is_empty() {
        return 0.0;
    }

    let max_weight = matches
        .iter()
        .map(|m| m.kind.weight())
        .fold(0.0_f64, f64::max);
    let total_contribution: f64 = matches
        .iter()
        .map(|m| m.kind.weight() * m.count.min(3) as f64 / 3.0)
        .sum();
    let multi_type_boost = if matches.len() > 1 {
        0.10 * (matches.len() - 1) as f64
    } else {
        0.0
    };

    let raw = (max_weight * 0.85).max(total_contribution * 0.7) + multi_type_boost;
    raw.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PatternKind;

    fn kinds(matches: &[PatternMatch]) -> Vec<PatternKind> {
        matches.iter().map(|m| m.kind).collect()
    }

    #[test]
    fn clean_content_has_no_matches() {
        assert!(scan("Hey, how are you doing today? The weather is nice!").is_empty());
        assert_eq!(aggregate(&[]), 0.0);
    }

    #[test]
    fn repeated_substrings_count_once_per_category() {
        let matches = scan("call (555) 123-4567 or (555) 123-4567");
        assert_eq!(kinds(&matches), vec![PatternKind::Phone]);
        assert_eq!(matches[0].count, 1);
        assert_eq!(matches[0].samples, vec!["(555) 123-4567"]);
    }

    #[test]
    fn distinct_hits_accumulate_with_bounded_samples() {
        let matches = scan(
            "ring (555) 123-4567 or (555) 123-4568 or (555) 123-4569 or (555) 123-4570",
        );
        assert_eq!(matches[0].count, 4);
        assert_eq!(matches[0].samples.len(), MAX_SAMPLES);
    }

    #[test]
    fn single_phone_clears_the_block_band() {
        let matches = scan("Call me at (555) 123-4567");
        let score = aggregate(&matches);
        assert!(score >= 0.65, "score {score} should block");
    }

    #[test]
    fn single_url_lands_in_the_nudge_band() {
        let matches = scan("see https://example.com/profile");
        let score = aggregate(&matches);
        assert!((0.40..0.65).contains(&score), "score {score} should nudge");
    }

    #[test]
    fn lone_obfuscation_stays_low() {
        let matches = scan("five five five");
        let score = aggregate(&matches);
        assert!(score < 0.40, "score {score} should allow");
    }

    #[test]
    fn combinations_escalate() {
        let single = aggregate(&scan("john.doe@example.com"));
        let combined = aggregate(&scan("john.doe@example.com or (555) 123-4567"));
        assert!(combined > single);
        assert!(combined <= 1.0);
    }

    #[test]
    fn count_contribution_saturates_at_three() {
        let three = scan("a https://x.io/1 b https://x.io/2 c https://x.io/3");
        let five = scan("a https://x.io/1 b https://x.io/2 c https://x.io/3 d https://x.io/4 e https://x.io/5");
        assert_eq!(aggregate(&three), aggregate(&five));
    }

    #[test]
    fn score_never_leaves_unit_interval() {
        let matches = scan(
            "+1 555 123 4567 john@example.com https://a.io/b whatsapp j o h n @ g m a i l . c o m",
        );
        let score = aggregate(&matches);
        assert!((0.0..=1.0).contains(&score));
    }
}
