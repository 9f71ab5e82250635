//! Identity matching across systems.
//!
//! Finds the record in one system that most plausibly describes the same
//! person as a query from another system, using name variants and token
//! overlap on top of [`SimilarityEngine`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use idbridge_core::{DirectoryIdentity, ErpPersonRecord, LocalAccount};

use crate::similarity::{Confidence, ConfidencePolicy, SimilarityEngine};

/// Anything that carries a person's full name.
pub trait MatchSubject {
    /// Full name used for matching.
    fn subject_name(&self) -> String;
}

impl MatchSubject for ErpPersonRecord {
    fn subject_name(&self) -> String {
        self.full_name.clone()
    }
}

impl MatchSubject for DirectoryIdentity {
    fn subject_name(&self) -> String {
        self.full_name()
    }
}

impl MatchSubject for LocalAccount {
    fn subject_name(&self) -> String {
        self.full_name_source_erp
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map_or_else(|| self.full_name(), str::to_string)
    }
}

/// The person being looked for.
///
/// The first name is the primary one and determines the length used for
/// confidence classification. Further names (such as a directory display name)
/// are tried as alternates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameQuery {
    names: Vec<String>,
}

impl NameQuery {
    /// Query from a single full name.
    pub fn from_full_name(name: impl Into<String>) -> Self {
        Self::from_names([name.into()])
    }

    /// Query from given name and surname.
    #[must_use]
    pub fn from_parts(given_name: &str, surname: &str) -> Self {
        Self::from_full_name(format!("{} {}", given_name.trim(), surname.trim()))
    }

    /// Query from a directory identity: "given surname" plus its display name.
    #[must_use]
    pub fn from_directory(identity: &DirectoryIdentity) -> Self {
        let mut names = vec![identity.full_name()];
        if let Some(display) = identity.display_name.as_deref() {
            names.push(display.to_string());
        }
        Self::from_names(names)
    }

    fn from_names(names: impl IntoIterator<Item = String>) -> Self {
        let mut unique: Vec<String> = Vec::new();
        for name in names {
            let name = name.trim().to_string();
            if name.is_empty() {
                continue;
            }
            let normalized = SimilarityEngine::normalize(&name);
            if !unique
                .iter()
                .any(|n| SimilarityEngine::normalize(n) == normalized)
            {
                unique.push(name);
            }
        }
        Self { names: unique }
    }

    /// Names of the query, primary first.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Normalized length of the primary name.
    #[must_use]
    pub fn primary_length(&self) -> usize {
        self.names
            .first()
            .map_or(0, |name| SimilarityEngine::normalize(name).chars().count())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A candidate that won the match.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate<'a, T> {
    pub record: &'a T,
    pub similarity_score: u8,
    /// Which comparison produced the score.
    pub strategy_label: String,
}

/// Outcome of a match.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult<'a, T> {
    pub chosen_candidate: Option<MatchCandidate<'a, T>>,
    pub confidence: Confidence,
    /// Human-readable explanation of the decision, for audit logs.
    pub rationale: String,
}

impl<'a, T> MatchResult<'a, T> {
    fn unmatched(rationale: impl Into<String>) -> Self {
        Self {
            chosen_candidate: None,
            confidence: Confidence::None,
            rationale: rationale.into(),
        }
    }

    /// The chosen record, if any.
    #[must_use]
    pub fn record(&self) -> Option<&'a T> {
        self.chosen_candidate.as_ref().map(|c| c.record)
    }

    /// The chosen record, only when the confidence is `Exact` or `High`.
    #[must_use]
    pub fn confident_record(&self) -> Option<&'a T> {
        if self.confidence.is_confident() {
            self.record()
        } else {
            None
        }
    }

    #[must_use]
    pub fn score(&self) -> Option<u8> {
        self.chosen_candidate.as_ref().map(|c| c.similarity_score)
    }
}

/// Where a match is being made; each context has its own threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchContext {
    /// Interactive login: a person is present, so a lower bar is acceptable.
    Login,
    /// Unattended reconciliation: mistakes are not noticed, so the bar is higher.
    Batch,
}

/// Matcher thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Minimum score for login-time matching.
    #[serde(default = "default_login_threshold")]
    pub login_threshold: u8,
    /// Minimum score for batch reconciliation matching.
    #[serde(default = "default_batch_threshold")]
    pub batch_threshold: u8,
    #[serde(default)]
    pub confidence: ConfidencePolicy,
}

fn default_login_threshold() -> u8 {
    70
}

fn default_batch_threshold() -> u8 {
    80
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            login_threshold: default_login_threshold(),
            batch_threshold: default_batch_threshold(),
            confidence: ConfidencePolicy::default(),
        }
    }
}

impl MatcherConfig {
    #[must_use]
    pub fn threshold_for(&self, context: MatchContext) -> u8 {
        match context {
            MatchContext::Login => self.login_threshold,
            MatchContext::Batch => self.batch_threshold,
        }
    }
}

/// Cross-system identity matcher.
///
/// Every query variant is compared with every candidate variant, so a match
/// costs O(query variants × candidate variants × candidates). That is only
/// acceptable while rosters stay in the hundreds; larger rosters need
/// blocking (by surname, for instance) before scoring.
#[derive(Debug, Clone)]
pub struct IdentityMatcher {
    engine: SimilarityEngine,
    config: MatcherConfig,
}

impl Default for IdentityMatcher {
    fn default() -> Self {
        Self::new(MatcherConfig::default())
    }
}

impl IdentityMatcher {
    #[must_use]
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            engine: SimilarityEngine::with_policy(config.confidence.clone()),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    #[must_use]
    pub fn engine(&self) -> &SimilarityEngine {
        &self.engine
    }

    /// Match using the threshold configured for `context`.
    pub fn match_in<'a, T, I>(
        &self,
        context: MatchContext,
        query: &NameQuery,
        candidates: I,
    ) -> MatchResult<'a, T>
    where
        T: MatchSubject + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        self.match_candidates(query, candidates, self.config.threshold_for(context))
    }

    /// Pick the best candidate scoring at least `threshold`.
    ///
    /// Ties resolve to the earliest candidate. A chosen candidate whose score
    /// clears the threshold but not the length-adjusted confidence bar is
    /// reported with [`Confidence::Low`].
    pub fn match_candidates<'a, T, I>(
        &self,
        query: &NameQuery,
        candidates: I,
        threshold: u8,
    ) -> MatchResult<'a, T>
    where
        T: MatchSubject + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        if query.is_empty() {
            return MatchResult::unmatched("query has no usable name");
        }

        let query_variants = Self::variants_of(query.names());
        let mut best: Option<MatchCandidate<'a, T>> = None;
        let mut evaluated = 0usize;

        for candidate in candidates {
            let name = candidate.subject_name();
            if SimilarityEngine::normalize(&name).is_empty() {
                continue;
            }
            evaluated += 1;

            let (score, label) = self.score_candidate(query, &query_variants, &name);
            if best.as_ref().map_or(true, |b| score > b.similarity_score) {
                best = Some(MatchCandidate {
                    record: candidate,
                    similarity_score: score,
                    strategy_label: label,
                });
            }
        }

        let Some(best) = best else {
            return MatchResult::unmatched("no candidates to compare");
        };

        if best.similarity_score < threshold {
            debug!(
                score = best.similarity_score,
                threshold,
                evaluated,
                "Best candidate below threshold"
            );
            return MatchResult::unmatched(format!(
                "best candidate scored {} below threshold {threshold}",
                best.similarity_score
            ));
        }

        let confidence = match self
            .engine
            .confidence_of(best.similarity_score, query.primary_length())
        {
            Confidence::None => Confidence::Low,
            other => other,
        };

        let rationale = format!(
            "{} scored {} (threshold {threshold}, confidence {confidence})",
            best.strategy_label, best.similarity_score
        );
        debug!(
            score = best.similarity_score,
            threshold,
            %confidence,
            evaluated,
            "Identity matched"
        );

        MatchResult {
            chosen_candidate: Some(best),
            confidence,
            rationale,
        }
    }

    fn variants_of(names: &[String]) -> Vec<String> {
        let mut variants: Vec<String> = Vec::new();
        for name in names {
            for variant in SimilarityEngine::generate_name_variants(name) {
                if !variants.contains(&variant) {
                    variants.push(variant);
                }
            }
        }
        variants
    }

    fn score_candidate(
        &self,
        query: &NameQuery,
        query_variants: &[String],
        candidate_name: &str,
    ) -> (u8, String) {
        let mut score = 0u8;
        let mut label = String::from("no comparison");

        for candidate_variant in SimilarityEngine::generate_name_variants(candidate_name) {
            for query_variant in query_variants {
                let s = self.engine.similarity(query_variant, &candidate_variant);
                if s > score {
                    score = s;
                    label = format!("variant '{query_variant}' ~ '{candidate_variant}'");
                }
                if score == 100 {
                    return (score, label);
                }
            }
        }

        for name in query.names() {
            let s = self.engine.token_similarity(name, candidate_name);
            if s > score {
                score = s;
                label = format!("token overlap '{name}' ~ '{candidate_name}'");
            }
        }

        (score, label)
    }
}
