//! idbridge CLI library
//!
//! File-backed collaborators, error types and logging setup shared by the
//! `idbridge` binary and its tests.

pub mod commands;
pub mod error;
pub mod files;
pub mod logging;

pub use error::{CliError, CliResult};
pub use files::{load_permissions, JsonAccountStore, JsonErpRoster};
