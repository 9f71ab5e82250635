//! JSON-file collaborators.
//!
//! The CLI runs without a database: the ERP export, the account store and the
//! permission grants are plain JSON files.

use async_trait::async_trait;
use idbridge_core::{
    AccountId, AccountStore, ErpPersonId, ErpPersonRecord, ErpRosterSource, InMemoryAccountStore,
    LocalAccount, PermissionSet, StaticPermissionResolver, StoreError, StoreResult,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// ERP roster read from a JSON array on every fetch.
#[derive(Debug, Clone)]
pub struct JsonErpRoster {
    path: PathBuf,
}

impl JsonErpRoster {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ErpRosterSource for JsonErpRoster {
    async fn fetch_erp_roster(&self) -> StoreResult<Vec<ErpPersonRecord>> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            StoreError::backend_with_source(format!("cannot read {}", self.path.display()), e)
        })?;
        let records: Vec<ErpPersonRecord> = serde_json::from_slice(&bytes).map_err(|e| {
            StoreError::backend_with_source(format!("invalid ERP roster {}", self.path.display()), e)
        })?;
        debug!(path = %self.path.display(), records = records.len(), "Loaded ERP roster");
        Ok(records)
    }
}

/// Account store persisted to a JSON array after every write.
///
/// Writes go to a sibling temporary file that is renamed over the original,
/// so a crash never leaves a truncated store behind.
#[derive(Debug)]
pub struct JsonAccountStore {
    path: PathBuf,
    accounts: InMemoryAccountStore,
    write_lock: Mutex<()>,
}

impl JsonAccountStore {
    /// Open the store. A missing file is an empty store.
    pub async fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let accounts = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Vec<LocalAccount>>(&bytes).map_err(|e| {
                StoreError::backend_with_source(format!("invalid account store {}", path.display()), e)
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(StoreError::backend_with_source(
                    format!("cannot read {}", path.display()),
                    e,
                ))
            }
        };
        debug!(path = %path.display(), accounts = accounts.len(), "Opened account store");

        Ok(Self {
            path,
            accounts: InMemoryAccountStore::with_accounts(accounts),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.accounts.snapshot().await;
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| StoreError::backend_with_source("cannot serialize accounts", e))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(|e| {
            StoreError::backend_with_source(format!("cannot write {}", tmp.display()), e)
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            StoreError::backend_with_source(format!("cannot replace {}", self.path.display()), e)
        })
    }
}

#[async_trait]
impl AccountStore for JsonAccountStore {
    async fn find_by_id(&self, id: AccountId) -> StoreResult<Option<LocalAccount>> {
        self.accounts.find_by_id(id).await
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<LocalAccount>> {
        self.accounts.find_by_username(username).await
    }

    async fn find_by_linked_erp_id(
        &self,
        erp_id: &ErpPersonId,
    ) -> StoreResult<Option<LocalAccount>> {
        self.accounts.find_by_linked_erp_id(erp_id).await
    }

    async fn list(&self) -> StoreResult<Vec<LocalAccount>> {
        self.accounts.list().await
    }

    async fn create(&self, account: LocalAccount) -> StoreResult<LocalAccount> {
        let created = self.accounts.create(account).await?;
        self.persist().await?;
        Ok(created)
    }

    async fn update(&self, account: &LocalAccount) -> StoreResult<()> {
        self.accounts.update(account).await?;
        self.persist().await
    }
}

#[derive(Debug, Default, Deserialize)]
struct PermissionFile {
    #[serde(default)]
    default: Vec<String>,
    #[serde(default)]
    users: BTreeMap<String, Vec<String>>,
}

/// Load permission grants:
///
/// ```json
/// { "default": ["portal.read"], "users": { "mlopez": ["ward.manage"] } }
/// ```
///
/// Listed users get exactly their own grants; everyone else gets `default`.
/// Without a file every account gets an empty permission set.
pub async fn load_permissions(path: Option<&Path>) -> StoreResult<StaticPermissionResolver> {
    let file = match path {
        Some(path) => {
            let bytes = tokio::fs::read(path).await.map_err(|e| {
                StoreError::backend_with_source(format!("cannot read {}", path.display()), e)
            })?;
            serde_json::from_slice::<PermissionFile>(&bytes).map_err(|e| {
                StoreError::backend_with_source(format!("invalid permissions {}", path.display()), e)
            })?
        }
        None => PermissionFile::default(),
    };

    let mut resolver =
        StaticPermissionResolver::new().with_default(file.default.into_iter().collect());
    for (username, grants) in file.users {
        resolver = resolver.grant(&username, grants.into_iter().collect::<PermissionSet>());
    }
    Ok(resolver)
}
