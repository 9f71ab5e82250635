//! idbridge Reconciliation
//!
//! Batch synchronization of the ERP personnel roster, the local account store
//! and the directory roster.
//!
//! - ERP records with a linked account update it: names and active flag come
//!   from the ERP record, and a matching directory identity switches the
//!   account to directory authentication.
//! - ERP records without an account create one, with the directory username
//!   when a directory identity matches confidently and a generated one
//!   otherwise.
//! - Accounts whose ERP person left the roster are deactivated, never deleted.
//!
//! The directory roster is cached for a configurable time-to-live; see
//! [`RosterCache`].

pub mod cache;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod report;
pub mod username;

pub use cache::{Clock, ManualClock, RosterCache, SystemClock};
pub use config::{ReconcileConfig, ReconcileOptions};
pub use error::ReconcileError;
pub use orchestrator::ReconciliationOrchestrator;
pub use report::{ReconciliationReport, RecordError};
pub use username::{base_username, unique_username};
