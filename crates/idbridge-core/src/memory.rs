//! In-memory collaborators.
//!
//! Used by tests, by the CLI's file-backed stores and by embedders that keep
//! rosters in memory.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::ids::{AccountId, ErpPersonId};
use crate::model::{ErpPersonRecord, LocalAccount, PermissionSet};
use crate::store::{AccountStore, ErpRosterSource, PermissionResolver};

/// Account store backed by a vector, preserving insertion order.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<Vec<LocalAccount>>,
}

impl InMemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with accounts. Uniqueness is not re-checked.
    #[must_use]
    pub fn with_accounts(accounts: Vec<LocalAccount>) -> Self {
        Self {
            accounts: RwLock::new(accounts),
        }
    }

    /// Snapshot of every account.
    pub async fn snapshot(&self) -> Vec<LocalAccount> {
        self.accounts.read().await.clone()
    }

    fn check_unique(
        accounts: &[LocalAccount],
        candidate: &LocalAccount,
    ) -> StoreResult<()> {
        for existing in accounts.iter().filter(|a| a.id != candidate.id) {
            if existing.username.eq_ignore_ascii_case(&candidate.username) {
                return Err(StoreError::conflict(format!(
                    "username '{}' is already taken",
                    candidate.username
                )));
            }
            if candidate.linked_erp_id.is_some() && existing.linked_erp_id == candidate.linked_erp_id
            {
                return Err(StoreError::conflict(format!(
                    "ERP person {} is already linked to account {}",
                    candidate
                        .linked_erp_id
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                    existing.id
                )));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn find_by_id(&self, id: AccountId) -> StoreResult<Option<LocalAccount>> {
        Ok(self
            .accounts
            .read()
            .await
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<LocalAccount>> {
        Ok(self
            .accounts
            .read()
            .await
            .iter()
            .find(|a| a.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn find_by_linked_erp_id(
        &self,
        erp_id: &ErpPersonId,
    ) -> StoreResult<Option<LocalAccount>> {
        Ok(self
            .accounts
            .read()
            .await
            .iter()
            .find(|a| a.linked_erp_id.as_ref() == Some(erp_id))
            .cloned())
    }

    async fn list(&self) -> StoreResult<Vec<LocalAccount>> {
        Ok(self.snapshot().await)
    }

    async fn create(&self, account: LocalAccount) -> StoreResult<LocalAccount> {
        let mut accounts = self.accounts.write().await;
        if accounts.iter().any(|a| a.id == account.id) {
            return Err(StoreError::conflict(format!(
                "account {} already exists",
                account.id
            )));
        }
        Self::check_unique(&accounts, &account)?;
        accounts.push(account.clone());
        Ok(account)
    }

    async fn update(&self, account: &LocalAccount) -> StoreResult<()> {
        let mut accounts = self.accounts.write().await;
        Self::check_unique(&accounts, account)?;
        let slot = accounts
            .iter_mut()
            .find(|a| a.id == account.id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "account",
                id: account.id.to_string(),
            })?;
        *slot = account.clone();
        Ok(())
    }
}

/// ERP roster held in memory. The roster can be replaced between runs.
#[derive(Debug, Default)]
pub struct StaticErpRoster {
    records: RwLock<Vec<ErpPersonRecord>>,
}

impl StaticErpRoster {
    #[must_use]
    pub fn new(records: Vec<ErpPersonRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    /// Replace the roster contents.
    pub async fn replace(&self, records: Vec<ErpPersonRecord>) {
        *self.records.write().await = records;
    }
}

#[async_trait]
impl ErpRosterSource for StaticErpRoster {
    async fn fetch_erp_roster(&self) -> StoreResult<Vec<ErpPersonRecord>> {
        Ok(self.records.read().await.clone())
    }
}

/// Permission resolver with a fixed username → permissions table.
#[derive(Debug, Default, Clone)]
pub struct StaticPermissionResolver {
    by_username: HashMap<String, PermissionSet>,
    default_permissions: PermissionSet,
}

impl StaticPermissionResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Permissions granted to accounts without an explicit entry.
    #[must_use]
    pub fn with_default(mut self, permissions: PermissionSet) -> Self {
        self.default_permissions = permissions;
        self
    }

    /// Grant a permission set to a username.
    #[must_use]
    pub fn grant(mut self, username: &str, permissions: PermissionSet) -> Self {
        self.by_username
            .insert(username.to_ascii_lowercase(), permissions);
        self
    }
}

#[async_trait]
impl PermissionResolver for StaticPermissionResolver {
    async fn resolve_permissions(&self, account: &LocalAccount) -> StoreResult<PermissionSet> {
        Ok(self
            .by_username
            .get(&account.username.to_ascii_lowercase())
            .cloned()
            .unwrap_or_else(|| self.default_permissions.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(username: &str) -> LocalAccount {
        LocalAccount::new(username, format!("{username}@example.com"), "Test", "User")
    }

    #[tokio::test]
    async fn test_find_by_username_ignores_case() {
        let store = InMemoryAccountStore::new();
        store.create(account("MLopez")).await.unwrap();

        let found = store.find_by_username("mlopez").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_username() {
        let store = InMemoryAccountStore::new();
        store.create(account("jdoe")).await.unwrap();

        let err = store.create(account("JDOE")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_linked_erp_id_is_unique() {
        let store = InMemoryAccountStore::new();
        store
            .create(account("a").linked_to(ErpPersonId::from(1)))
            .await
            .unwrap();

        let err = store
            .create(account("b").linked_to(ErpPersonId::from(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        let linked = store
            .find_by_linked_erp_id(&ErpPersonId::from(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(linked.username, "a");
    }

    #[tokio::test]
    async fn test_update_unknown_account_fails() {
        let store = InMemoryAccountStore::new();
        let err = store.update(&account("ghost")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_replaces_account() {
        let store = InMemoryAccountStore::new();
        let mut created = store.create(account("jdoe")).await.unwrap();
        created.active = false;
        store.update(&created).await.unwrap();

        let reloaded = store.find_by_id(created.id).await.unwrap().unwrap();
        assert!(!reloaded.active);
    }

    #[tokio::test]
    async fn test_static_roster_replace() {
        let roster = StaticErpRoster::new(vec![ErpPersonRecord::new(1, "Maria Lopez")]);
        assert_eq!(roster.fetch_erp_roster().await.unwrap().len(), 1);

        roster.replace(Vec::new()).await;
        assert!(roster.fetch_erp_roster().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_static_permissions_fall_back_to_default() {
        let resolver = StaticPermissionResolver::new()
            .with_default(["profile.read"].into_iter().collect())
            .grant("Admin", ["users.manage"].into_iter().collect());

        let admin = resolver.resolve_permissions(&account("admin")).await.unwrap();
        assert!(admin.contains("users.manage"));

        let other = resolver.resolve_permissions(&account("jdoe")).await.unwrap();
        assert!(other.contains("profile.read"));
        assert!(!other.contains("users.manage"));
    }
}
