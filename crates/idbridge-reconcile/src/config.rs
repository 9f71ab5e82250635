//! Reconciliation settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ReconcileError;

/// Options for one reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOptions {
    /// Do not create accounts for inactive ERP records.
    #[serde(default = "default_true")]
    pub only_active: bool,
    /// Ignore the cached directory roster and fetch a fresh one.
    #[serde(default)]
    pub force_full: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            only_active: true,
            force_full: false,
        }
    }
}

impl ReconcileOptions {
    #[must_use]
    pub fn full() -> Self {
        Self {
            force_full: true,
            ..Self::default()
        }
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Only adopt identities whose match is classified exact or high.
    #[serde(default = "default_true")]
    pub require_confident_match: bool,

    /// Domain of generated email addresses.
    #[serde(default = "default_email_domain")]
    pub email_domain: String,

    /// How long a fetched directory roster is reused; 0 disables the cache.
    #[serde(default = "default_roster_cache_ttl_secs")]
    pub roster_cache_ttl_secs: u64,

    /// Accept an empty ERP roster, which deactivates every linked account.
    #[serde(default)]
    pub allow_empty_roster: bool,
}

fn default_true() -> bool {
    true
}

fn default_email_domain() -> String {
    "example.invalid".to_string()
}

fn default_roster_cache_ttl_secs() -> u64 {
    300
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            require_confident_match: true,
            email_domain: default_email_domain(),
            roster_cache_ttl_secs: default_roster_cache_ttl_secs(),
            allow_empty_roster: false,
        }
    }
}

impl ReconcileConfig {
    #[must_use]
    pub fn with_email_domain(mut self, domain: impl Into<String>) -> Self {
        self.email_domain = domain.into();
        self
    }

    #[must_use]
    pub fn roster_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.roster_cache_ttl_secs)
    }

    pub fn validate(&self) -> Result<(), ReconcileError> {
        let domain = self.email_domain.trim();
        if domain.is_empty() || domain.contains('@') || domain.contains(char::is_whitespace) {
            return Err(ReconcileError::invalid_configuration(
                "email_domain must be a bare domain name",
            ));
        }
        Ok(())
    }
}
