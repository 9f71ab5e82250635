//! idbridge
//!
//! Identity reconciliation and hybrid authentication across an enterprise
//! directory, an ERP personnel roster and a local account store.
//!
//! [`IdentityService`] exposes the four operations applications use:
//!
//! - [`IdentityService::authenticate`]: directory login with local fallback
//! - [`IdentityService::change_password`]: policy-checked, verified change
//! - [`IdentityService::validate_password_policy`]: dry-run policy check
//! - [`IdentityService::run_reconciliation`]: batch sync of the three rosters
//!
//! Configuration comes from [`IdbridgeConfig::from_env`].

pub mod config;
pub mod error;
pub mod service;

pub use config::IdbridgeConfig;
pub use error::{ConfigError, ServiceError};
pub use service::{Collaborators, IdentityService};

pub use idbridge_auth::{AuthenticatedUser, ChangeError, LoginError, LoginPath};
pub use idbridge_core::{
    AccountId, AuthMode, DirectoryIdentity, ErpPersonId, ErpPersonRecord, ErrorKind, LocalAccount,
    OwnerHints, PermissionSet,
};
pub use idbridge_policy::{PolicyEvaluation, PolicyViolation};
pub use idbridge_reconcile::{ReconcileError, ReconcileOptions, ReconciliationReport};
