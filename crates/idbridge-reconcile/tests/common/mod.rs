//! Test doubles for reconciliation runs.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use idbridge_core::{
    AccountId, AccountStore, DirectoryIdentity, ErpPersonId, ErpPersonRecord, ErpRosterSource,
    InMemoryAccountStore, LocalAccount, StaticErpRoster, StoreError, StoreResult,
};
use idbridge_directory::{Directory, DirectoryError, DirectoryResult};
use idbridge_matching::IdentityMatcher;
use idbridge_reconcile::{ManualClock, ReconcileConfig, ReconciliationOrchestrator};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const EMAIL_DOMAIN: &str = "staff.example";

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
}

/// Directory that only serves a roster.
#[derive(Default)]
pub struct FakeDirectory {
    roster: Mutex<Vec<DirectoryIdentity>>,
    offline: AtomicBool,
    fetch_calls: AtomicUsize,
}

impl FakeDirectory {
    pub fn with_identities(identities: Vec<DirectoryIdentity>) -> Self {
        Self {
            roster: Mutex::new(identities),
            ..Self::default()
        }
    }

    pub fn set_identities(&self, identities: Vec<DirectoryIdentity>) {
        *self.roster.lock().unwrap() = identities;
    }

    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Directory for FakeDirectory {
    async fn authenticate(&self, _username: &str, _secret: &str) -> DirectoryResult<DirectoryIdentity> {
        Err(DirectoryError::AuthFailed)
    }

    async fn fetch_all_identities(&self) -> Vec<DirectoryIdentity> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Vec::new();
        }
        self.roster.lock().unwrap().clone()
    }

    async fn change_secret(&self, _username: &str, _old: &str, _new: &str) -> DirectoryResult<()> {
        Err(DirectoryError::unavailable("not supported by this double"))
    }
}

/// Account store that fails writes for selected ERP people.
#[derive(Default)]
pub struct FlakyAccountStore {
    inner: InMemoryAccountStore,
    failing: Mutex<HashSet<ErpPersonId>>,
    list_fails: AtomicBool,
    creates: AtomicUsize,
    updates: AtomicUsize,
}

impl FlakyAccountStore {
    pub fn with_accounts(accounts: Vec<LocalAccount>) -> Self {
        Self {
            inner: InMemoryAccountStore::with_accounts(accounts),
            ..Self::default()
        }
    }

    pub fn fail_writes_for(&self, erp_id: impl Into<ErpPersonId>) {
        self.failing.lock().unwrap().insert(erp_id.into());
    }

    pub fn fail_list(&self) {
        self.list_fails.store(true, Ordering::SeqCst);
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> Vec<LocalAccount> {
        self.inner.snapshot().await
    }

    pub async fn linked_to(&self, erp_id: impl Into<ErpPersonId>) -> LocalAccount {
        let erp_id = erp_id.into();
        self.inner
            .find_by_linked_erp_id(&erp_id)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("no account linked to ERP person {erp_id}"))
    }

    fn check(&self, account: &LocalAccount) -> StoreResult<()> {
        let failing = self.failing.lock().unwrap();
        match &account.linked_erp_id {
            Some(id) if failing.contains(id) => Err(StoreError::backend("write timed out")),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl AccountStore for FlakyAccountStore {
    async fn find_by_id(&self, id: AccountId) -> StoreResult<Option<LocalAccount>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<LocalAccount>> {
        self.inner.find_by_username(username).await
    }

    async fn find_by_linked_erp_id(&self, erp_id: &ErpPersonId) -> StoreResult<Option<LocalAccount>> {
        self.inner.find_by_linked_erp_id(erp_id).await
    }

    async fn list(&self) -> StoreResult<Vec<LocalAccount>> {
        if self.list_fails.load(Ordering::SeqCst) {
            return Err(StoreError::backend("connection reset"));
        }
        self.inner.list().await
    }

    async fn create(&self, account: LocalAccount) -> StoreResult<LocalAccount> {
        self.check(&account)?;
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create(account).await
    }

    async fn update(&self, account: &LocalAccount) -> StoreResult<()> {
        self.check(account)?;
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update(account).await
    }
}

/// ERP source that is down.
pub struct UnreachableErp;

#[async_trait]
impl ErpRosterSource for UnreachableErp {
    async fn fetch_erp_roster(&self) -> StoreResult<Vec<ErpPersonRecord>> {
        Err(StoreError::backend("ERP endpoint returned 502"))
    }
}

pub fn maria() -> ErpPersonRecord {
    ErpPersonRecord::new(1, "Maria Lopez")
}

pub fn juan() -> ErpPersonRecord {
    ErpPersonRecord::new(2, "Juan Perez")
}

pub fn maria_identity() -> DirectoryIdentity {
    DirectoryIdentity::new("mlopez")
        .with_names("Maria", "Lopez")
        .with_email("maria.lopez@corp.example")
}

pub fn config() -> ReconcileConfig {
    ReconcileConfig::default().with_email_domain(EMAIL_DOMAIN)
}

/// Orchestrator wired to in-memory collaborators and a manual clock.
pub struct Harness {
    pub erp: Arc<StaticErpRoster>,
    pub accounts: Arc<FlakyAccountStore>,
    pub directory: Arc<FakeDirectory>,
    pub clock: Arc<ManualClock>,
    pub orchestrator: ReconciliationOrchestrator,
}

impl Harness {
    pub fn new(
        roster: Vec<ErpPersonRecord>,
        accounts: Vec<LocalAccount>,
        identities: Vec<DirectoryIdentity>,
    ) -> Self {
        Self::with_config(roster, accounts, identities, config())
    }

    pub fn with_config(
        roster: Vec<ErpPersonRecord>,
        accounts: Vec<LocalAccount>,
        identities: Vec<DirectoryIdentity>,
        config: ReconcileConfig,
    ) -> Self {
        let erp = Arc::new(StaticErpRoster::new(roster));
        let accounts = Arc::new(FlakyAccountStore::with_accounts(accounts));
        let directory = Arc::new(FakeDirectory::with_identities(identities));
        let clock = Arc::new(ManualClock::new(start()));
        let orchestrator = ReconciliationOrchestrator::new(
            erp.clone(),
            accounts.clone(),
            directory.clone(),
            IdentityMatcher::default(),
            config,
        )
        .unwrap()
        .with_clock(clock.clone());

        Self {
            erp,
            accounts,
            directory,
            clock,
            orchestrator,
        }
    }
}
