//! CLI error types and exit codes

use idbridge::{ConfigError, ReconcileError, ServiceError};
use idbridge_core::StoreError;
use thiserror::Error;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: General error
/// - 2: Credentials rejected
/// - 3: Directory or store unavailable
/// - 4: Validation error
/// - 5: Reconciliation finished with record errors
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Could not start: {0}")]
    Service(#[from] ServiceError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Login failed: {0}")]
    LoginFailed(String),

    #[error("Password change failed: {0}")]
    ChangeFailed(String),

    #[error("Password rejected:\n  - {}", .0.join("\n  - "))]
    PolicyRejected(Vec<String>),

    #[error("Reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Reconciliation finished with {0} record error(s)")]
    PartialFailure(usize),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Input error: {0}")]
    Input(String),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::LoginFailed(_) | CliError::ChangeFailed(_) => 2,
            CliError::Store(_) | CliError::Reconcile(_) => 3,
            CliError::PolicyRejected(_) => 4,
            CliError::PartialFailure(_) => 5,
            CliError::Config(_)
            | CliError::Service(_)
            | CliError::Io(_)
            | CliError::Input(_) => 1,
        }
    }

    /// Print the error to stderr
    pub fn print(&self) {
        if std::env::var("NO_COLOR").is_err() {
            eprintln!("\x1b[31mError:\x1b[0m {self}");
        } else {
            eprintln!("Error: {self}");
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Io(e.to_string())
    }
}

impl From<dialoguer::Error> for CliError {
    fn from(e: dialoguer::Error) -> Self {
        CliError::Input(format!("Dialog error: {e}"))
    }
}
