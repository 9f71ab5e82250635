//! Facade errors.

use idbridge_core::ErrorKind;
use idbridge_directory::DirectoryError;
use idbridge_policy::InvalidPolicy;
use idbridge_reconcile::ReconcileError;
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Errors raised while assembling an [`IdentityService`](crate::IdentityService).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Policy(#[from] InvalidPolicy),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

impl ServiceError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Config(_) | ServiceError::Policy(_) => ErrorKind::Configuration,
            ServiceError::Directory(e) => e.kind(),
            ServiceError::Reconcile(e) => e.kind(),
        }
    }
}
