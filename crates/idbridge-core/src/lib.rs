//! idbridge Core Library
//!
//! Shared types and traits for the idbridge identity reconciliation engine.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (`AccountId`, `ErpPersonId`)
//! - [`model`] - Identity records from the directory, the ERP roster and the local store
//! - [`store`] - External collaborator traits (ERP roster, account store, permissions)
//! - [`memory`] - In-memory collaborator implementations
//! - [`error`] - Error taxonomy shared by every component
//!
//! # Example
//!
//! ```
//! use idbridge_core::{AuthMode, ErpPersonId, LocalAccount};
//!
//! let account = LocalAccount::new("mlopez", "mlopez@example.com", "Maria", "Lopez")
//!     .linked_to(ErpPersonId::from(1));
//!
//! assert_eq!(account.auth_mode, AuthMode::Local);
//! assert_eq!(account.linked_erp_id, Some(ErpPersonId::from(1)));
//! ```

pub mod error;
pub mod ids;
pub mod memory;
pub mod model;
pub mod store;

pub use error::{ErrorKind, StoreError, StoreResult};
pub use ids::{AccountId, ErpPersonId, ParseIdError};
pub use memory::{InMemoryAccountStore, StaticErpRoster, StaticPermissionResolver};
pub use model::{
    AuthMode, DirectoryIdentity, ErpPersonRecord, LocalAccount, OwnerHints, PermissionSet,
};
pub use store::{AccountStore, ErpRosterSource, PermissionResolver};
