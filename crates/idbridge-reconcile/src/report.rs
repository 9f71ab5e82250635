//! Reconciliation run report.

use chrono::{DateTime, Utc};
use idbridge_core::{AccountId, ErpPersonId, ErrorKind};
use serde::Serialize;
use std::time::Duration;

/// A record that could not be reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub erp_person_id: Option<ErpPersonId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<AccountId>,
    pub kind: ErrorKind,
    pub message: String,
}

/// Counts and errors of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub created: usize,
    /// Accounts whose fields changed, not counting the sync timestamp.
    pub updated: usize,
    pub unchanged: usize,
    /// Inactive ERP records without an account, left alone.
    pub skipped: usize,
    pub deactivated: usize,
    pub errors: Vec<RecordError>,
    pub erp_roster_size: usize,
    pub directory_roster_size: usize,
    /// Whether the directory roster came from the cache.
    pub directory_roster_cached: bool,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ReconciliationReport {
    pub(crate) fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            created: 0,
            updated: 0,
            unchanged: 0,
            skipped: 0,
            deactivated: 0,
            errors: Vec::new(),
            erp_roster_size: 0,
            directory_roster_size: 0,
            directory_roster_cached: false,
            started_at,
            duration_ms: 0,
        }
    }

    pub(crate) fn finish(&mut self, elapsed: Duration) {
        self.duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    }

    /// `true` when every record was reconciled.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// [`ErrorKind::PartialBatchFailure`] when some records failed.
    #[must_use]
    pub fn failure_kind(&self) -> Option<ErrorKind> {
        (!self.is_clean()).then_some(ErrorKind::PartialBatchFailure)
    }

    /// Number of accounts written with a material change.
    #[must_use]
    pub fn changes(&self) -> usize {
        self.created + self.updated + self.deactivated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_failure_kind() {
        let mut report = ReconciliationReport::new(Utc::now());
        assert!(report.is_clean());
        assert_eq!(report.failure_kind(), None);

        report.errors.push(RecordError {
            erp_person_id: Some(ErpPersonId::from(7)),
            account_id: None,
            kind: ErrorKind::Internal,
            message: "store unavailable".to_string(),
        });
        assert_eq!(report.failure_kind(), Some(ErrorKind::PartialBatchFailure));
    }

    #[test]
    fn test_serializes_to_json() {
        let mut report = ReconciliationReport::new(Utc::now());
        report.created = 2;
        report.finish(Duration::from_millis(42));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["created"], 2);
        assert_eq!(json["duration_ms"], 42);
        assert!(json["errors"].as_array().unwrap().is_empty());
    }
}
