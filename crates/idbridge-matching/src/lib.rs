//! Fuzzy name matching for identity reconciliation.
//!
//! The same person is spelled differently in the enterprise directory, the ERP
//! roster and the local account store: accents dropped, names transposed,
//! middle names present in one system only. This crate provides:
//!
//! - [`SimilarityEngine`]: normalization and 0-100 similarity scores
//! - [`IdentityMatcher`]: best-candidate selection with confidence levels
//!
//! # Example
//!
//! ```
//! use idbridge_core::ErpPersonRecord;
//! use idbridge_matching::{IdentityMatcher, MatchContext, NameQuery};
//!
//! let roster = vec![ErpPersonRecord::new(1, "María López")];
//! let matcher = IdentityMatcher::default();
//!
//! let result = matcher.match_in(
//!     MatchContext::Batch,
//!     &NameQuery::from_parts("Lopez", "Maria"),
//!     &roster,
//! );
//! assert!(result.confident_record().is_some());
//! ```

pub mod matcher;
pub mod similarity;

pub use matcher::{
    IdentityMatcher, MatchCandidate, MatchContext, MatchResult, MatchSubject, MatcherConfig,
    NameQuery,
};
pub use similarity::{Confidence, ConfidencePolicy, ScoredMatch, SimilarityEngine};
