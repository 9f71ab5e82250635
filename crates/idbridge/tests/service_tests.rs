//! The facade wired to in-memory collaborators and a directory double.

use async_trait::async_trait;
use idbridge::{
    AuthMode, Collaborators, DirectoryIdentity, ErpPersonId, ErpPersonRecord, ErrorKind,
    IdbridgeConfig, IdentityService, LoginError, LoginPath, OwnerHints, PolicyViolation,
    ReconcileOptions, ServiceError,
};
use idbridge_core::{AccountStore, InMemoryAccountStore, PermissionSet, StaticErpRoster, StaticPermissionResolver};
use idbridge_directory::{DirectoryConfig, DirectoryError, DirectoryResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const MARIA_PASSWORD: &str = "Old-Secret-9x";

#[derive(Default)]
struct FakeDirectory {
    users: Mutex<HashMap<String, (String, DirectoryIdentity)>>,
    change_calls: AtomicUsize,
}

impl FakeDirectory {
    fn with_user(self, identity: DirectoryIdentity, password: &str) -> Self {
        self.users
            .lock()
            .unwrap()
            .insert(identity.username.clone(), (password.to_string(), identity));
        self
    }
}

#[async_trait]
impl idbridge_directory::Directory for FakeDirectory {
    async fn authenticate(&self, username: &str, secret: &str) -> DirectoryResult<DirectoryIdentity> {
        match self.users.lock().unwrap().get(username) {
            Some((password, identity)) if password == secret => Ok(identity.clone()),
            _ => Err(DirectoryError::AuthFailed),
        }
    }

    async fn fetch_all_identities(&self) -> Vec<DirectoryIdentity> {
        let mut identities: Vec<DirectoryIdentity> = self
            .users
            .lock()
            .unwrap()
            .values()
            .map(|(_, identity)| identity.clone())
            .collect();
        identities.sort_by(|a, b| a.username.cmp(&b.username));
        identities
    }

    async fn change_secret(&self, username: &str, old: &str, new: &str) -> DirectoryResult<()> {
        self.change_calls.fetch_add(1, Ordering::SeqCst);
        let mut users = self.users.lock().unwrap();
        match users.get_mut(username) {
            Some((password, _)) if password == old => {
                *password = new.to_string();
                Ok(())
            }
            _ => Err(DirectoryError::AuthFailed),
        }
    }
}

struct Setup {
    service: IdentityService,
    accounts: Arc<InMemoryAccountStore>,
    directory: Arc<FakeDirectory>,
}

fn config() -> IdbridgeConfig {
    let mut config = IdbridgeConfig::new(DirectoryConfig::new("dc01.corp.example", "DC=corp,DC=example"));
    config.reconcile.email_domain = "staff.example".to_string();
    config
}

fn setup() -> Setup {
    let directory = Arc::new(
        FakeDirectory::default()
            .with_user(
                DirectoryIdentity::new("mlopez")
                    .with_names("Maria", "Lopez")
                    .with_email("maria.lopez@corp.example"),
                MARIA_PASSWORD,
            )
            .with_user(
                DirectoryIdentity::new("contractor7").with_names("Kim", "Contractor"),
                "Contract-Pass-7",
            ),
    );
    let accounts = Arc::new(InMemoryAccountStore::new());
    let collaborators = Collaborators {
        erp: Arc::new(StaticErpRoster::new(vec![
            ErpPersonRecord::new(1, "Maria Lopez"),
            ErpPersonRecord::new(2, "Juan Perez"),
        ])),
        accounts: accounts.clone(),
        permissions: Arc::new(
            StaticPermissionResolver::new()
                .with_default(PermissionSet::from_iter(["portal.read"])),
        ),
    };

    let service = IdentityService::with_directory(config(), collaborators, directory.clone()).unwrap();
    Setup {
        service,
        accounts,
        directory,
    }
}

#[tokio::test]
async fn test_reconcile_then_directory_login() {
    let s = setup();

    let report = s
        .service
        .run_reconciliation(ReconcileOptions::default())
        .await
        .unwrap();
    assert_eq!(report.created, 2);

    let user = s.service.authenticate("mlopez", MARIA_PASSWORD).await.unwrap();
    assert_eq!(user.path, LoginPath::Directory);
    assert_eq!(user.account.auth_mode, AuthMode::Directory);
    assert_eq!(user.account.linked_erp_id, Some(ErpPersonId::from(1)));
    assert!(user.permissions.contains("portal.read"));
}

#[tokio::test]
async fn test_directory_login_without_erp_record_is_not_provisioned() {
    let s = setup();
    s.service
        .run_reconciliation(ReconcileOptions::default())
        .await
        .unwrap();
    let before = s.accounts.list().await.unwrap().len();

    let err = s
        .service
        .authenticate("contractor7", "Contract-Pass-7")
        .await
        .unwrap_err();

    assert!(matches!(err, LoginError::IdentityNotProvisioned { .. }));
    assert_eq!(err.kind(), ErrorKind::IdentityNotProvisioned);
    assert_eq!(s.accounts.list().await.unwrap().len(), before);
}

#[tokio::test]
async fn test_policy_failure_never_reaches_directory() {
    let s = setup();
    s.service
        .run_reconciliation(ReconcileOptions::default())
        .await
        .unwrap();

    let err = s
        .service
        .change_password("mlopez", MARIA_PASSWORD, "Mlopez2024", "Mlopez2024")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PolicyRejected);
    assert_eq!(s.directory.change_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_password_change_through_directory() {
    let s = setup();
    s.service
        .run_reconciliation(ReconcileOptions::default())
        .await
        .unwrap();

    s.service
        .change_password("mlopez", MARIA_PASSWORD, "N3w-Secure!Pass", "N3w-Secure!Pass")
        .await
        .unwrap();

    assert_eq!(s.directory.change_calls.load(Ordering::SeqCst), 1);
    assert!(s.service.authenticate("mlopez", "N3w-Secure!Pass").await.is_ok());
}

#[tokio::test]
async fn test_validate_password_policy_flags_username() {
    let s = setup();

    let evaluation = s
        .service
        .validate_password_policy("Pass1234", &OwnerHints::for_username("pass1234"));

    assert!(!evaluation.is_valid);
    assert!(evaluation.has_violation(|v| matches!(v, PolicyViolation::ContainsPersonalInfo { .. })));
}

#[test]
fn test_invalid_reconcile_config_is_rejected() {
    let mut config = config();
    config.reconcile.email_domain = String::new();
    let collaborators = Collaborators {
        erp: Arc::new(StaticErpRoster::default()),
        accounts: Arc::new(InMemoryAccountStore::new()),
        permissions: Arc::new(StaticPermissionResolver::new()),
    };

    let err = IdentityService::with_directory(config, collaborators, Arc::new(FakeDirectory::default()))
        .unwrap_err();

    assert!(matches!(err, ServiceError::Reconcile(_)));
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
