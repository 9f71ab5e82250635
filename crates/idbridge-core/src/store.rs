//! External collaborator traits.
//!
//! The engine never talks to a database directly. The ERP roster query, the
//! local account repository and the permission chain are injected through these
//! traits so the surrounding application decides how they are backed.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::ids::{AccountId, ErpPersonId};
use crate::model::{ErpPersonRecord, LocalAccount, PermissionSet};

/// Source of the authoritative ERP personnel roster.
#[async_trait]
pub trait ErpRosterSource: Send + Sync {
    /// Fetch the complete roster.
    async fn fetch_erp_roster(&self) -> StoreResult<Vec<ErpPersonRecord>>;
}

/// Repository of local accounts.
///
/// Implementations must keep `username` (case-insensitive) and `linked_erp_id`
/// unique, and must never hard-delete accounts.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Find an account by id.
    async fn find_by_id(&self, id: AccountId) -> StoreResult<Option<LocalAccount>>;

    /// Find an account by username, ignoring case.
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<LocalAccount>>;

    /// Find the account linked to an ERP person.
    async fn find_by_linked_erp_id(
        &self,
        erp_id: &ErpPersonId,
    ) -> StoreResult<Option<LocalAccount>>;

    /// List every account, active or not.
    async fn list(&self) -> StoreResult<Vec<LocalAccount>>;

    /// Insert a new account.
    async fn create(&self, account: LocalAccount) -> StoreResult<LocalAccount>;

    /// Replace an existing account, matched by id.
    async fn update(&self, account: &LocalAccount) -> StoreResult<()>;
}

/// Resolves the permissions of an account through its organizational position.
#[async_trait]
pub trait PermissionResolver: Send + Sync {
    async fn resolve_permissions(&self, account: &LocalAccount) -> StoreResult<PermissionSet>;
}
