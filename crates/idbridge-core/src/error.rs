//! Error Types
//!
//! The shared failure taxonomy plus the error type for external store collaborators.
//!
//! Every component keeps its own closed error enum; each of them maps onto
//! [`ErrorKind`] so callers can branch on the kind of failure without string
//! matching.

use serde::Serialize;
use thiserror::Error;

/// Classification of every failure the engine can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Transport-level failure; retryable through the next strategy.
    ConnectionUnavailable,
    /// Credentials were rejected. Terminal for the attempt.
    AuthFailed,
    /// A strategy ran out of time. Treated like `ConnectionUnavailable` for fallback.
    Timeout,
    /// Input failed validation. Terminal and user-correctable.
    PolicyRejected,
    /// Valid credentials but no ERP-backed account. Needs administrative action.
    IdentityNotProvisioned,
    /// A credential write could not be verified afterwards.
    ChangeUnverified,
    /// Some records of a batch failed; the batch itself completed.
    PartialBatchFailure,
    /// Invalid or missing configuration.
    Configuration,
    /// A referenced record does not exist.
    NotFound,
    /// Anything else: store failures, hashing failures, bugs.
    Internal,
}

impl ErrorKind {
    /// Whether the failure should trigger the next fallback strategy.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(self, ErrorKind::ConnectionUnavailable | ErrorKind::Timeout)
    }
}

/// Error raised by the ERP roster, account store and permission collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness rule would be violated.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// The backing system failed.
    #[error("store backend error: {message}")]
    Backend {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StoreError {
    /// Create a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        StoreError::Backend {
            message: message.into(),
            source: None,
        }
    }

    /// Create a backend error with source.
    pub fn backend_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        StoreError::Backend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        StoreError::Conflict {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::Conflict { .. } | StoreError::Backend { .. } => ErrorKind::Internal,
        }
    }

    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "STORE_NOT_FOUND",
            StoreError::Conflict { .. } => "STORE_CONFLICT",
            StoreError::Backend { .. } => "STORE_BACKEND",
        }
    }
}

/// Result type for store collaborators.
pub type StoreResult<T> = Result<T, StoreError>;
