//! Test doubles for the authentication flows.

#![allow(dead_code)]

use async_trait::async_trait;
use idbridge_auth::SecretHasher;
use idbridge_core::{
    AuthMode, DirectoryIdentity, ErpPersonId, InMemoryAccountStore, LocalAccount, PermissionSet,
    StaticPermissionResolver,
};
use idbridge_directory::{Directory, DirectoryError, DirectoryResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Directory double that counts every call.
#[derive(Default)]
pub struct FakeDirectory {
    users: Mutex<HashMap<String, (String, DirectoryIdentity)>>,
    unreachable: AtomicBool,
    unverifiable: AtomicBool,
    auth_calls: AtomicUsize,
    change_calls: AtomicUsize,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, identity: DirectoryIdentity, password: &str) -> Self {
        self.users
            .lock()
            .unwrap()
            .insert(identity.username.clone(), (password.to_string(), identity));
        self
    }

    pub fn go_offline(&self) {
        self.unreachable.store(true, Ordering::SeqCst);
    }

    /// Writes succeed but the new password never authenticates.
    pub fn fail_verification(&self) {
        self.unverifiable.store(true, Ordering::SeqCst);
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    pub fn change_calls(&self) -> usize {
        self.change_calls.load(Ordering::SeqCst)
    }

    pub fn password_of(&self, username: &str) -> Option<String> {
        self.users
            .lock()
            .unwrap()
            .get(username)
            .map(|(password, _)| password.clone())
    }
}

#[async_trait]
impl Directory for FakeDirectory {
    async fn authenticate(&self, username: &str, secret: &str) -> DirectoryResult<DirectoryIdentity> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(DirectoryError::unavailable("connection refused"));
        }
        let users = self.users.lock().unwrap();
        match users.get(username) {
            Some((password, identity)) if password == secret && !secret.is_empty() => {
                Ok(identity.clone())
            }
            _ => Err(DirectoryError::AuthFailed),
        }
    }

    async fn fetch_all_identities(&self) -> Vec<DirectoryIdentity> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Vec::new();
        }
        self.users
            .lock()
            .unwrap()
            .values()
            .map(|(_, identity)| identity.clone())
            .collect()
    }

    async fn change_secret(
        &self,
        username: &str,
        old_secret: &str,
        new_secret: &str,
    ) -> DirectoryResult<()> {
        self.change_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(DirectoryError::unavailable("connection refused"));
        }
        let mut users = self.users.lock().unwrap();
        let Some((password, _)) = users.get_mut(username) else {
            return Err(DirectoryError::UserNotFound {
                username: username.to_string(),
            });
        };
        if password != old_secret {
            return Err(DirectoryError::AuthFailed);
        }
        if self.unverifiable.load(Ordering::SeqCst) {
            return Err(DirectoryError::ChangeUnverified {
                username: username.to_string(),
                attempts: 3,
            });
        }
        *password = new_secret.to_string();
        Ok(())
    }
}

pub fn hasher() -> SecretHasher {
    SecretHasher::with_params(1024, 1, 1).unwrap()
}

pub fn maria_identity() -> DirectoryIdentity {
    DirectoryIdentity::new("mlopez")
        .with_names("Maria", "Lopez")
        .with_email("maria.lopez@corp.example")
}

/// ERP-backed account created by reconciliation before the directory knew Maria.
pub fn maria_local() -> LocalAccount {
    let mut account = LocalAccount::new("mlopez2", "mlopez2@staff.example", "Maria", "Lopez")
        .linked_to(ErpPersonId::from(1));
    account.full_name_source_erp = Some("Maria Lopez".to_string());
    account
}

/// Local-only account with a hashed password.
pub fn local_with_password(username: &str, given: &str, surname: &str, password: &str) -> LocalAccount {
    let hash = hasher().hash(password).unwrap();
    LocalAccount::new(
        username,
        format!("{username}@staff.example"),
        given,
        surname,
    )
    .with_secret_hash(hash)
}

pub fn directory_account(username: &str, given: &str, surname: &str, erp_id: i64) -> LocalAccount {
    LocalAccount::new(username, format!("{username}@corp.example"), given, surname)
        .linked_to(ErpPersonId::from(erp_id))
        .with_auth_mode(AuthMode::Directory)
}

pub fn permissions() -> StaticPermissionResolver {
    StaticPermissionResolver::new()
        .with_default(PermissionSet::from_iter(["portal.read"]))
        .grant("mlopez", PermissionSet::from_iter(["portal.read", "ward.manage"]))
}

pub fn store(accounts: Vec<LocalAccount>) -> Arc<InMemoryAccountStore> {
    Arc::new(InMemoryAccountStore::with_accounts(accounts))
}
