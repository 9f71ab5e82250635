//! String similarity engine.
//!
//! Provides the scoring primitives used for cross-system name matching:
//! - Unicode-aware normalization (case, diacritics, whitespace)
//! - Edit-distance similarity on a 0-100 scale
//! - Token-overlap similarity tolerant of reordered name parts
//! - Name variant generation for given/surname transposition
//! - Length-aware confidence classification

use serde::{Deserialize, Serialize};
use strsim::levenshtein;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Minimum per-token similarity for two tokens to count as the same word.
pub const TOKEN_MATCH_THRESHOLD: u8 = 85;

/// Discrete trustworthiness of a fuzzy match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Identical after normalization.
    Exact,
    /// Cleared the length-adjusted confidence threshold.
    High,
    /// Cleared the caller's minimum threshold but not the confidence threshold.
    Low,
    /// Nothing usable.
    None,
}

impl Confidence {
    /// `Exact` or `High`.
    #[must_use]
    pub fn is_confident(self) -> bool {
        matches!(self, Confidence::Exact | Confidence::High)
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Confidence::Exact => "exact",
            Confidence::High => "high",
            Confidence::Low => "low",
            Confidence::None => "none",
        };
        f.write_str(label)
    }
}

/// Length-dependent thresholds for [`SimilarityEngine::confidence_of`].
///
/// Short names need a near-perfect score because a single typo is a large share
/// of the string; long names tolerate more edits. The defaults are a tunable
/// heuristic, not a law.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidencePolicy {
    /// Names up to this many characters are "short".
    #[serde(default = "default_short_name_max_len")]
    pub short_name_max_len: usize,
    /// Score required for short names.
    #[serde(default = "default_short_name_threshold")]
    pub short_name_threshold: u8,
    /// Names longer than this many characters are "long".
    #[serde(default = "default_long_name_min_len")]
    pub long_name_min_len: usize,
    /// Score required for long names.
    #[serde(default = "default_long_name_threshold")]
    pub long_name_threshold: u8,
    /// Score required for everything in between.
    #[serde(default = "default_threshold")]
    pub default_threshold: u8,
}

fn default_short_name_max_len() -> usize {
    10
}

fn default_short_name_threshold() -> u8 {
    90
}

fn default_long_name_min_len() -> usize {
    20
}

fn default_long_name_threshold() -> u8 {
    75
}

fn default_threshold() -> u8 {
    85
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self {
            short_name_max_len: default_short_name_max_len(),
            short_name_threshold: default_short_name_threshold(),
            long_name_min_len: default_long_name_min_len(),
            long_name_threshold: default_long_name_threshold(),
            default_threshold: default_threshold(),
        }
    }
}

impl ConfidencePolicy {
    /// Score a target of the given length must reach to be trusted.
    #[must_use]
    pub fn threshold_for(&self, target_length: usize) -> u8 {
        if target_length <= self.short_name_max_len {
            self.short_name_threshold
        } else if target_length > self.long_name_min_len {
            self.long_name_threshold
        } else {
            self.default_threshold
        }
    }
}

/// Best scoring candidate returned by [`SimilarityEngine::best_match`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredMatch<'a> {
    /// Position of the candidate in the input slice.
    pub index: usize,
    pub candidate: &'a str,
    pub score: u8,
}

/// Fuzzy string scoring for person names.
#[derive(Debug, Clone, Default)]
pub struct SimilarityEngine {
    policy: ConfidencePolicy,
}

impl SimilarityEngine {
    /// Create an engine with the default confidence policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with a custom confidence policy.
    #[must_use]
    pub fn with_policy(policy: ConfidencePolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> &ConfidencePolicy {
        &self.policy
    }

    /// Lowercase, strip diacritics, collapse whitespace and trim.
    #[must_use]
    pub fn normalize(name: &str) -> String {
        let stripped: String = name.nfd().filter(|c| !is_combining_mark(*c)).collect();
        stripped
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Edit-distance similarity of the normalized strings, 0-100.
    ///
    /// Symmetric, and 100 whenever both sides normalize to the same string
    /// (including two empty strings).
    #[must_use]
    pub fn similarity(&self, a: &str, b: &str) -> u8 {
        let a = Self::normalize(a);
        let b = Self::normalize(b);
        Self::normalized_similarity(&a, &b)
    }

    fn normalized_similarity(a: &str, b: &str) -> u8 {
        let max_len = a.chars().count().max(b.chars().count());
        if max_len == 0 {
            return 100;
        }

        let distance = levenshtein(a, b);
        let penalty = (distance as f64 / max_len as f64 * 100.0).round();
        100u8.saturating_sub(penalty.min(100.0) as u8)
    }

    /// Share of tokens the two names have in common, 0-100.
    ///
    /// Tokens of one character (initials) are ignored. Two tokens match when
    /// their similarity is at least [`TOKEN_MATCH_THRESHOLD`]; each token on the
    /// right-hand side can be matched once.
    #[must_use]
    pub fn token_similarity(&self, a: &str, b: &str) -> u8 {
        let left = Self::tokens(a);
        let right = Self::tokens(b);

        if left.is_empty() && right.is_empty() {
            return 100;
        }
        if left.is_empty() || right.is_empty() {
            return 0;
        }

        let mut used = vec![false; right.len()];
        let mut matched = 0usize;
        for token in &left {
            let hit = right.iter().enumerate().find(|(i, other)| {
                !used[*i] && Self::normalized_similarity(token, other) >= TOKEN_MATCH_THRESHOLD
            });
            if let Some((i, _)) = hit {
                used[i] = true;
                matched += 1;
            }
        }

        let total = left.len().max(right.len());
        (matched as f64 / total as f64 * 100.0).round() as u8
    }

    fn tokens(value: &str) -> Vec<String> {
        Self::normalize(value)
            .split(' ')
            .filter(|token| token.chars().count() > 1)
            .map(str::to_string)
            .collect()
    }

    /// Reorderings of a full name that other systems commonly use.
    ///
    /// Produces, deduplicated and in this order: the name as given,
    /// "last first", "last, first", "first second", "first last" and the fully
    /// reversed token order.
    #[must_use]
    pub fn generate_name_variants(full_name: &str) -> Vec<String> {
        let normalized = Self::normalize(full_name);
        let tokens: Vec<&str> = normalized.split(' ').filter(|t| !t.is_empty()).collect();

        let (first, last) = match (tokens.first(), tokens.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Vec::new(),
        };

        if tokens.len() == 1 {
            return vec![first.to_string()];
        }

        let candidates = [
            tokens.join(" "),
            format!("{last} {first}"),
            format!("{last}, {first}"),
            format!("{first} {}", tokens[1]),
            format!("{first} {last}"),
            tokens.iter().rev().copied().collect::<Vec<_>>().join(" "),
        ];

        let mut variants: Vec<String> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if !variants.contains(&candidate) {
                variants.push(candidate);
            }
        }
        variants
    }

    /// Highest scoring candidate at or above `min_threshold`.
    ///
    /// Ties resolve to the earliest candidate in input order.
    #[must_use]
    pub fn best_match<'a, S: AsRef<str>>(
        &self,
        target: &str,
        candidates: &'a [S],
        min_threshold: u8,
    ) -> Option<ScoredMatch<'a>> {
        let target = Self::normalize(target);
        let mut best: Option<ScoredMatch<'a>> = None;

        for (index, candidate) in candidates.iter().enumerate() {
            let candidate = candidate.as_ref();
            let score = Self::normalized_similarity(&target, &Self::normalize(candidate));
            if score < min_threshold {
                continue;
            }
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(ScoredMatch {
                    index,
                    candidate,
                    score,
                });
            }
        }

        best
    }

    /// Classify a score for a target of `target_length` characters.
    ///
    /// Yields `Exact` for 100, `High` at or above the policy threshold for that
    /// length, and `None` otherwise.
    #[must_use]
    pub fn confidence_of(&self, score: u8, target_length: usize) -> Confidence {
        if score >= 100 {
            Confidence::Exact
        } else if score >= self.policy.threshold_for(target_length) {
            Confidence::High
        } else {
            Confidence::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_diacritics_case_and_whitespace() {
        assert_eq!(SimilarityEngine::normalize("  José   ÁLVAREZ  "), "jose alvarez");
        assert_eq!(SimilarityEngine::normalize("Núñez"), "nunez");
        assert_eq!(SimilarityEngine::normalize(""), "");
    }

    #[test]
    fn test_similarity_identity() {
        let engine = SimilarityEngine::new();
        for value in ["", "a", "Maria Lopez", "ÁÉÍÓÚ"] {
            assert_eq!(engine.similarity(value, value), 100, "value {value:?}");
        }
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let engine = SimilarityEngine::new();
        let pairs = [("kitten", "sitting"), ("Maria", "Mario"), ("", "abc")];
        for (a, b) in pairs {
            assert_eq!(engine.similarity(a, b), engine.similarity(b, a));
        }
    }

    #[test]
    fn test_similarity_ignores_accents_and_case() {
        let engine = SimilarityEngine::new();
        assert_eq!(engine.similarity("Juan Pérez", "juan perez"), 100);
    }

    #[test]
    fn test_similarity_values() {
        let engine = SimilarityEngine::new();
        // 3 edits over 7 characters.
        assert_eq!(engine.similarity("kitten", "sitting"), 57);
        assert_eq!(engine.similarity("", "abc"), 0);
        assert_eq!(engine.similarity("abcd", "abce"), 75);
    }

    #[test]
    fn test_token_similarity_tolerates_reordering() {
        let engine = SimilarityEngine::new();
        assert_eq!(engine.token_similarity("Lopez Maria", "Maria Lopez"), 100);
        assert_eq!(engine.token_similarity("Maria Lopez Garcia", "Lopez Maria"), 67);
    }

    #[test]
    fn test_token_similarity_ignores_initials() {
        let engine = SimilarityEngine::new();
        assert_eq!(engine.token_similarity("Maria J Lopez", "Maria Lopez"), 100);
    }

    #[test]
    fn test_token_similarity_matches_each_token_once() {
        let engine = SimilarityEngine::new();
        assert_eq!(engine.token_similarity("Maria Maria", "Maria Lopez"), 50);
    }

    #[test]
    fn test_token_similarity_fuzzy_tokens() {
        let engine = SimilarityEngine::new();
        // "gonzalez" vs "gonzales" is one edit in eight characters (88).
        assert_eq!(engine.token_similarity("Ana Gonzalez", "Ana Gonzales"), 100);
    }

    #[test]
    fn test_name_variants_two_tokens() {
        let variants = SimilarityEngine::generate_name_variants("Maria López");
        assert_eq!(variants, vec!["maria lopez", "lopez maria", "lopez, maria"]);
    }

    #[test]
    fn test_name_variants_three_tokens() {
        let variants = SimilarityEngine::generate_name_variants("Juan Carlos Perez");
        assert_eq!(
            variants,
            vec![
                "juan carlos perez",
                "perez juan",
                "perez, juan",
                "juan carlos",
                "juan perez",
                "perez carlos juan",
            ]
        );
    }

    #[test]
    fn test_name_variants_degenerate_inputs() {
        assert!(SimilarityEngine::generate_name_variants("   ").is_empty());
        assert_eq!(SimilarityEngine::generate_name_variants("Cher"), vec!["cher"]);
    }

    #[test]
    fn test_best_match_none_below_threshold() {
        let engine = SimilarityEngine::new();
        let candidates = ["Robert Brown", "Alice Green"];
        assert!(engine.best_match("Maria Lopez", &candidates, 80).is_none());
    }

    #[test]
    fn test_best_match_returns_highest_scorer() {
        let engine = SimilarityEngine::new();
        let candidates = ["Maria Lopes", "Maria Lopez", "Mario Lopez"];
        let best = engine.best_match("maria lopez", &candidates, 50).unwrap();
        assert_eq!(best.index, 1);
        assert_eq!(best.score, 100);
    }

    #[test]
    fn test_best_match_ties_resolve_to_first() {
        let engine = SimilarityEngine::new();
        let candidates = ["abce", "abcf", "abcd"];
        let best = engine.best_match("abcx", &candidates, 50).unwrap();
        assert_eq!(best.index, 0);
        assert_eq!(best.score, 75);
    }

    #[test]
    fn test_confidence_short_name_needs_ninety() {
        let engine = SimilarityEngine::new();
        assert_eq!(engine.confidence_of(85, 7), Confidence::None);
        assert_eq!(engine.confidence_of(90, 7), Confidence::High);
    }

    #[test]
    fn test_confidence_long_name_accepts_seventy_five() {
        let engine = SimilarityEngine::new();
        assert_eq!(engine.confidence_of(78, 25), Confidence::High);
        assert_eq!(engine.confidence_of(74, 25), Confidence::None);
    }

    #[test]
    fn test_confidence_default_band_and_exact() {
        let engine = SimilarityEngine::new();
        assert_eq!(engine.confidence_of(85, 15), Confidence::High);
        assert_eq!(engine.confidence_of(84, 15), Confidence::None);
        assert_eq!(engine.confidence_of(100, 3), Confidence::Exact);
        // A length of exactly 20 is still in the default band.
        assert_eq!(engine.confidence_of(80, 20), Confidence::None);
    }

    #[test]
    fn test_custom_confidence_policy() {
        let engine = SimilarityEngine::with_policy(ConfidencePolicy {
            default_threshold: 60,
            ..ConfidencePolicy::default()
        });
        assert_eq!(engine.confidence_of(61, 15), Confidence::High);
    }
}
