//! Directory error types
//!
//! Error definitions with transient/terminal classification for the fallback
//! runner: transient errors move on to the next strategy, terminal ones stop
//! the chain and surface to the caller.

use idbridge_core::ErrorKind;
use thiserror::Error;

/// Error that can occur during directory operations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Could not reach the directory over this transport.
    #[error("directory unavailable: {message}")]
    ConnectionUnavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A strategy ran out of time.
    #[error("{operation} timed out after {timeout_ms} ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// The directory rejected the credentials.
    #[error("authentication failed: invalid credentials")]
    AuthFailed,

    /// The new secret does not satisfy the password policy.
    #[error("password policy rejected: {}", violations.join("; "))]
    PolicyRejected { violations: Vec<String> },

    /// The user has no entry in the directory.
    #[error("user not found in directory: {username}")]
    UserNotFound { username: String },

    /// The directory refused the new secret (history, complexity, age rules).
    #[error("password change rejected by directory: {message}")]
    ChangeRejected { message: String },

    /// The write reported success but the new secret does not authenticate.
    #[error("password change for {username} could not be verified after {attempts} attempt(s)")]
    ChangeUnverified { username: String, attempts: u32 },

    /// A directory operation failed for a reason other than credentials.
    #[error("directory operation failed: {message}")]
    OperationFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Every strategy of a fallback chain failed.
    #[error("all {chain} strategies failed: {}", attempts.join("; "))]
    StrategiesExhausted {
        chain: &'static str,
        attempts: Vec<String>,
    },

    /// Configuration is invalid or a required setting is missing.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl DirectoryError {
    /// Check if the next fallback strategy should be tried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DirectoryError::ConnectionUnavailable { .. }
                | DirectoryError::Timeout { .. }
                | DirectoryError::OperationFailed { .. }
                | DirectoryError::StrategiesExhausted { .. }
        )
    }

    /// Map onto the shared failure taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            DirectoryError::ConnectionUnavailable { .. }
            | DirectoryError::StrategiesExhausted { .. } => ErrorKind::ConnectionUnavailable,
            DirectoryError::Timeout { .. } => ErrorKind::Timeout,
            DirectoryError::AuthFailed => ErrorKind::AuthFailed,
            DirectoryError::PolicyRejected { .. } | DirectoryError::ChangeRejected { .. } => {
                ErrorKind::PolicyRejected
            }
            DirectoryError::UserNotFound { .. } => ErrorKind::NotFound,
            DirectoryError::ChangeUnverified { .. } => ErrorKind::ChangeUnverified,
            DirectoryError::OperationFailed { .. } => ErrorKind::Internal,
            DirectoryError::InvalidConfiguration { .. } => ErrorKind::Configuration,
        }
    }

    /// Get an error code suitable for API responses and audit records.
    pub fn error_code(&self) -> &'static str {
        match self {
            DirectoryError::ConnectionUnavailable { .. } => "DIRECTORY_UNAVAILABLE",
            DirectoryError::Timeout { .. } => "DIRECTORY_TIMEOUT",
            DirectoryError::AuthFailed => "DIRECTORY_AUTH_FAILED",
            DirectoryError::PolicyRejected { .. } => "PASSWORD_POLICY_REJECTED",
            DirectoryError::UserNotFound { .. } => "DIRECTORY_USER_NOT_FOUND",
            DirectoryError::ChangeRejected { .. } => "PASSWORD_CHANGE_REJECTED",
            DirectoryError::ChangeUnverified { .. } => "PASSWORD_CHANGE_UNVERIFIED",
            DirectoryError::OperationFailed { .. } => "DIRECTORY_OPERATION_FAILED",
            DirectoryError::StrategiesExhausted { .. } => "DIRECTORY_STRATEGIES_EXHAUSTED",
            DirectoryError::InvalidConfiguration { .. } => "DIRECTORY_INVALID_CONFIGURATION",
        }
    }

    /// Create a connection error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        DirectoryError::ConnectionUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection error with source.
    pub fn unavailable_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::ConnectionUnavailable {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an operation failed error.
    pub fn operation_failed(message: impl Into<String>) -> Self {
        DirectoryError::OperationFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create an operation failed error with source.
    pub fn operation_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::OperationFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        DirectoryError::InvalidConfiguration {
            message: message.into(),
        }
    }
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;
