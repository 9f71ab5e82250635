//! Reconciliation errors.
//!
//! Only failures that prevent a run from starting are errors. Failures of
//! individual records are collected into the report instead.

use idbridge_core::{ErrorKind, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The ERP roster could not be fetched.
    #[error("failed to fetch ERP roster: {source}")]
    Roster {
        #[source]
        source: StoreError,
    },

    /// The ERP roster was empty and empty rosters are not accepted.
    #[error("ERP roster is empty; refusing to deactivate every linked account")]
    EmptyRoster,

    /// Local accounts could not be listed.
    #[error("failed to list local accounts: {source}")]
    Accounts {
        #[source]
        source: StoreError,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl ReconcileError {
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        ReconcileError::InvalidConfiguration {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReconcileError::Roster { source } | ReconcileError::Accounts { source } => {
                source.kind()
            }
            ReconcileError::EmptyRoster | ReconcileError::InvalidConfiguration { .. } => {
                ErrorKind::Configuration
            }
        }
    }

    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            ReconcileError::Roster { .. } => "RECONCILE_ROSTER_UNAVAILABLE",
            ReconcileError::EmptyRoster => "RECONCILE_EMPTY_ROSTER",
            ReconcileError::Accounts { .. } => "RECONCILE_ACCOUNTS_UNAVAILABLE",
            ReconcileError::InvalidConfiguration { .. } => "RECONCILE_INVALID_CONFIGURATION",
        }
    }
}
