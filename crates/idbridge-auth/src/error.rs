//! Authentication error types.
//!
//! Login failures all collapse to one public message so a caller cannot learn
//! which accounts exist or which path rejected them. Password change failures
//! keep their specific reason so the user can correct their input.

use idbridge_core::{ErrorKind, StoreError};
use idbridge_directory::DirectoryError;
use idbridge_policy::PolicyViolation;
use thiserror::Error;

/// Message returned for every rejected login.
pub const INVALID_CREDENTIALS: &str = "invalid credentials";

/// Errors from local secret hashing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HashError {
    #[error("password hashing failed: {message}")]
    HashingFailed { message: String },

    #[error("stored password hash has an invalid format")]
    InvalidHashFormat,
}

/// Why a login was rejected.
#[derive(Debug, Error)]
pub enum LoginError {
    /// No local account carries the submitted username.
    #[error("no account for {username}")]
    AccountNotFound { username: String },

    /// The account authenticates against the directory only.
    #[error("account {username} uses directory authentication")]
    WrongAuthMode { username: String },

    /// The account has no local secret to check against.
    #[error("account {username} has no local password")]
    NoLocalSecret { username: String },

    #[error("local password mismatch for {username}")]
    BadSecret { username: String },

    /// The directory accepted the credentials but no ERP-backed account exists.
    #[error("directory user {username} is not provisioned")]
    IdentityNotProvisioned { username: String },

    #[error("account {username} is inactive")]
    AccountInactive { username: String },

    #[error("account store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Hashing(#[from] HashError),
}

impl LoginError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoginError::AccountNotFound { .. }
            | LoginError::WrongAuthMode { .. }
            | LoginError::NoLocalSecret { .. }
            | LoginError::BadSecret { .. }
            | LoginError::AccountInactive { .. } => ErrorKind::AuthFailed,
            LoginError::IdentityNotProvisioned { .. } => ErrorKind::IdentityNotProvisioned,
            LoginError::Store(e) => e.kind(),
            LoginError::Hashing(_) => ErrorKind::Internal,
        }
    }

    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            LoginError::AccountNotFound { .. } => "LOGIN_ACCOUNT_NOT_FOUND",
            LoginError::WrongAuthMode { .. } => "LOGIN_WRONG_AUTH_MODE",
            LoginError::NoLocalSecret { .. } => "LOGIN_NO_LOCAL_SECRET",
            LoginError::BadSecret { .. } => "LOGIN_BAD_SECRET",
            LoginError::IdentityNotProvisioned { .. } => "LOGIN_IDENTITY_NOT_PROVISIONED",
            LoginError::AccountInactive { .. } => "LOGIN_ACCOUNT_INACTIVE",
            LoginError::Store(e) => e.error_code(),
            LoginError::Hashing(_) => "LOGIN_HASHING_FAILED",
        }
    }

    /// Text safe to show the person logging in.
    ///
    /// Identical for every variant, `IdentityNotProvisioned` included. Use
    /// [`LoginError::kind`] to tell them apart.
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        INVALID_CREDENTIALS
    }
}

/// Why a password change failed.
#[derive(Debug, Error)]
pub enum ChangeError {
    #[error("new password and confirmation do not match")]
    ConfirmationMismatch,

    #[error("no account for {username}")]
    AccountNotFound { username: String },

    #[error("account {username} is inactive")]
    AccountInactive { username: String },

    #[error("password policy rejected: {}", join_violations(violations))]
    PolicyRejected { violations: Vec<PolicyViolation> },

    #[error("account {username} has no local password")]
    NoLocalSecret { username: String },

    #[error("current password is incorrect")]
    BadSecret,

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("account store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Hashing(#[from] HashError),
}

fn join_violations(violations: &[PolicyViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ChangeError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChangeError::ConfirmationMismatch | ChangeError::PolicyRejected { .. } => {
                ErrorKind::PolicyRejected
            }
            ChangeError::AccountNotFound { .. }
            | ChangeError::AccountInactive { .. }
            | ChangeError::NoLocalSecret { .. }
            | ChangeError::BadSecret => ErrorKind::AuthFailed,
            ChangeError::Directory(e) => e.kind(),
            ChangeError::Store(e) => e.kind(),
            ChangeError::Hashing(_) => ErrorKind::Internal,
        }
    }

    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            ChangeError::ConfirmationMismatch => "CHANGE_CONFIRMATION_MISMATCH",
            ChangeError::AccountNotFound { .. } => "CHANGE_ACCOUNT_NOT_FOUND",
            ChangeError::AccountInactive { .. } => "CHANGE_ACCOUNT_INACTIVE",
            ChangeError::PolicyRejected { .. } => "PASSWORD_POLICY_REJECTED",
            ChangeError::NoLocalSecret { .. } => "CHANGE_NO_LOCAL_SECRET",
            ChangeError::BadSecret => "CHANGE_BAD_SECRET",
            ChangeError::Directory(e) => e.error_code(),
            ChangeError::Store(e) => e.error_code(),
            ChangeError::Hashing(_) => "CHANGE_HASHING_FAILED",
        }
    }

    /// Text safe to show the person changing their password.
    ///
    /// Policy failures list every violation. Unknown accounts read like a
    /// wrong current password.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            ChangeError::ConfirmationMismatch => self.to_string(),
            ChangeError::PolicyRejected { violations } => join_violations(violations),
            ChangeError::AccountNotFound { .. }
            | ChangeError::AccountInactive { .. }
            | ChangeError::NoLocalSecret { .. }
            | ChangeError::BadSecret => "current password is incorrect".to_string(),
            ChangeError::Directory(e) => match e {
                DirectoryError::PolicyRejected { violations } => violations.join("; "),
                DirectoryError::AuthFailed => "current password is incorrect".to_string(),
                DirectoryError::ChangeRejected { .. } => {
                    "the directory rejected the new password; it may have been used before"
                        .to_string()
                }
                DirectoryError::ChangeUnverified { .. } => {
                    "the password change could not be confirmed; try signing in with the new password or contact support"
                        .to_string()
                }
                _ => "the directory is unavailable; try again later".to_string(),
            },
            ChangeError::Store(_) | ChangeError::Hashing(_) => {
                "the password could not be changed; try again later".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_failures_share_public_message() {
        let errors = [
            LoginError::AccountNotFound {
                username: "ghost".to_string(),
            },
            LoginError::WrongAuthMode {
                username: "mlopez".to_string(),
            },
            LoginError::BadSecret {
                username: "mlopez".to_string(),
            },
            LoginError::Store(StoreError::backend("down")),
        ];
        for error in errors {
            assert_eq!(error.public_message(), INVALID_CREDENTIALS);
        }
    }

    #[test]
    fn test_not_provisioned_has_own_kind_but_generic_message() {
        let err = LoginError::IdentityNotProvisioned {
            username: "contractor".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::IdentityNotProvisioned);
        assert_eq!(err.public_message(), INVALID_CREDENTIALS);
    }

    #[test]
    fn test_policy_rejection_lists_violations() {
        let err = ChangeError::PolicyRejected {
            violations: vec![
                PolicyViolation::TooShort { min: 8, actual: 5 },
                PolicyViolation::MissingDigit,
            ],
        };
        let message = err.public_message();
        assert!(message.contains("at least 8 characters"));
        assert!(message.contains("; "));
        assert_eq!(err.kind(), ErrorKind::PolicyRejected);
    }

    #[test]
    fn test_unverified_directory_change_is_not_success_text() {
        let err = ChangeError::from(DirectoryError::ChangeUnverified {
            username: "mlopez".to_string(),
            attempts: 3,
        });
        assert_eq!(err.kind(), ErrorKind::ChangeUnverified);
        assert!(err.public_message().contains("could not be confirmed"));
    }
}
