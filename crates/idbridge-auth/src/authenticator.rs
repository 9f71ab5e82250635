//! Hybrid login.
//!
//! A login first tries the directory. When the directory accepts the
//! credentials the directory username must resolve to a local account, either
//! directly or by linking an ERP-backed account found by name matching. Any
//! directory failure falls back to the account's local secret.

use chrono::Utc;
use idbridge_core::{
    AccountStore, AuthMode, DirectoryIdentity, LocalAccount, PermissionResolver, PermissionSet,
};
use idbridge_directory::Directory;
use idbridge_matching::{IdentityMatcher, MatchContext, NameQuery};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::error::LoginError;
use crate::hashing::SecretHasher;

/// Which path accepted the credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginPath {
    Directory,
    Local,
}

/// A successful login.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub account: LocalAccount,
    pub permissions: PermissionSet,
    pub path: LoginPath,
    /// The directory record, when the directory accepted the credentials.
    pub directory_identity: Option<DirectoryIdentity>,
}

/// Login state machine over the directory and the local account store.
pub struct HybridAuthenticator {
    directory: Arc<dyn Directory>,
    accounts: Arc<dyn AccountStore>,
    permissions: Arc<dyn PermissionResolver>,
    matcher: IdentityMatcher,
    hasher: SecretHasher,
    /// Serializes the re-check and write of login-time links.
    link_lock: Mutex<()>,
}

impl HybridAuthenticator {
    pub fn new(
        directory: Arc<dyn Directory>,
        accounts: Arc<dyn AccountStore>,
        permissions: Arc<dyn PermissionResolver>,
        matcher: IdentityMatcher,
    ) -> Self {
        Self {
            directory,
            accounts,
            permissions,
            matcher,
            hasher: SecretHasher::new(),
            link_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_hasher(mut self, hasher: SecretHasher) -> Self {
        self.hasher = hasher;
        self
    }

    /// Authenticate a user.
    ///
    /// Directory rejections of any kind move on to the local path. A directory
    /// success that maps to no ERP-backed account is final:
    /// [`LoginError::IdentityNotProvisioned`].
    #[instrument(skip(self, secret))]
    pub async fn authenticate(
        &self,
        username: &str,
        secret: &str,
    ) -> Result<AuthenticatedUser, LoginError> {
        let started = Instant::now();
        let username = username.trim();

        let result = match self.directory.authenticate(username, secret).await {
            Ok(identity) => self.directory_login(identity).await,
            Err(e) => {
                debug!(
                    username,
                    error_code = e.error_code(),
                    "Directory login failed, trying local credentials"
                );
                self.local_login(username, secret).await
            }
        };

        match &result {
            Ok(user) => info!(
                target: "audit",
                username,
                account_id = %user.account.id,
                path = ?user.path,
                elapsed_ms = started.elapsed().as_millis() as u64,
                outcome = "success",
                "Login"
            ),
            Err(e) => info!(
                target: "audit",
                username,
                elapsed_ms = started.elapsed().as_millis() as u64,
                outcome = e.error_code(),
                "Login"
            ),
        }
        result
    }

    async fn directory_login(
        &self,
        identity: DirectoryIdentity,
    ) -> Result<AuthenticatedUser, LoginError> {
        let account = match self.accounts.find_by_username(&identity.username).await? {
            Some(account) => account,
            None => self.link_by_name(&identity).await?,
        };

        if !account.active {
            return Err(LoginError::AccountInactive {
                username: account.username,
            });
        }

        self.finish(account, LoginPath::Directory, Some(identity))
            .await
    }

    /// Link the directory identity to an ERP-backed account that does not
    /// authenticate against the directory yet.
    async fn link_by_name(&self, identity: &DirectoryIdentity) -> Result<LocalAccount, LoginError> {
        let candidates: Vec<LocalAccount> = self
            .accounts
            .list()
            .await?
            .into_iter()
            .filter(|a| a.linked_erp_id.is_some() && a.auth_mode == AuthMode::Local && a.active)
            .collect();

        let query = NameQuery::from_directory(identity);
        let result = self
            .matcher
            .match_in(MatchContext::Login, &query, candidates.iter());

        let Some(matched) = result.record() else {
            info!(
                target: "audit",
                username = %identity.username,
                rationale = %result.rationale,
                "Directory identity has no ERP-backed account"
            );
            return Err(LoginError::IdentityNotProvisioned {
                username: identity.username.clone(),
            });
        };

        let _link = self.link_lock.lock().await;
        let still_linkable = self
            .accounts
            .find_by_id(matched.id)
            .await?
            .filter(|current| {
                current.auth_mode == AuthMode::Local
                    && current.active
                    && current.username == matched.username
                    && current.linked_erp_id == matched.linked_erp_id
            });
        let Some(mut account) = still_linkable else {
            info!(
                target: "audit",
                username = %identity.username,
                account_id = %matched.id,
                "Matched account was linked by another login"
            );
            return Err(LoginError::IdentityNotProvisioned {
                username: identity.username.clone(),
            });
        };

        let previous_username = std::mem::replace(&mut account.username, identity.username.clone());
        if let Some(email) = identity.email.as_deref().filter(|e| !e.trim().is_empty()) {
            account.email = email.trim().to_string();
        }
        account.auth_mode = AuthMode::Directory;
        self.accounts.update(&account).await?;

        info!(
            target: "audit",
            account_id = %account.id,
            previous_username = %previous_username,
            username = %account.username,
            confidence = %result.confidence,
            rationale = %result.rationale,
            "Linked directory identity at login"
        );
        Ok(account)
    }

    async fn local_login(&self, username: &str, secret: &str) -> Result<AuthenticatedUser, LoginError> {
        let account = self
            .accounts
            .find_by_username(username)
            .await?
            .ok_or_else(|| LoginError::AccountNotFound {
                username: username.to_string(),
            })?;

        if !account.active {
            return Err(LoginError::AccountInactive {
                username: account.username,
            });
        }
        if account.auth_mode == AuthMode::Directory {
            return Err(LoginError::WrongAuthMode {
                username: account.username,
            });
        }
        let Some(hash) = account.local_secret_hash.as_deref() else {
            return Err(LoginError::NoLocalSecret {
                username: account.username,
            });
        };
        if secret.is_empty() || !self.hasher.verify_blocking(secret, hash).await? {
            return Err(LoginError::BadSecret {
                username: account.username,
            });
        }

        self.finish(account, LoginPath::Local, None).await
    }

    async fn finish(
        &self,
        mut account: LocalAccount,
        path: LoginPath,
        directory_identity: Option<DirectoryIdentity>,
    ) -> Result<AuthenticatedUser, LoginError> {
        let permissions = self.permissions.resolve_permissions(&account).await?;
        // Stamp the stored copy so a concurrent reconciliation write survives.
        if let Some(current) = self.accounts.find_by_id(account.id).await? {
            account = current;
        }
        account.last_login = Some(Utc::now());
        self.accounts.update(&account).await?;

        Ok(AuthenticatedUser {
            account,
            permissions,
            path,
            directory_identity,
        })
    }
}
