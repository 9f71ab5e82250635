//! Password changes for directory and local accounts.

use idbridge_core::{AccountStore, AuthMode, OwnerHints};
use idbridge_directory::Directory;
use idbridge_policy::PasswordPolicyEngine;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

use crate::error::ChangeError;
use crate::hashing::SecretHasher;

/// Changes a user's password wherever their account authenticates.
///
/// The confirmation and the password policy are checked first; a rejected
/// password never reaches the directory.
pub struct PasswordChangeService {
    directory: Arc<dyn Directory>,
    accounts: Arc<dyn AccountStore>,
    policy: PasswordPolicyEngine,
    hasher: SecretHasher,
}

impl PasswordChangeService {
    pub fn new(
        directory: Arc<dyn Directory>,
        accounts: Arc<dyn AccountStore>,
        policy: PasswordPolicyEngine,
    ) -> Self {
        Self {
            directory,
            accounts,
            policy,
            hasher: SecretHasher::new(),
        }
    }

    #[must_use]
    pub fn with_hasher(mut self, hasher: SecretHasher) -> Self {
        self.hasher = hasher;
        self
    }

    #[instrument(skip(self, current, new, confirm))]
    pub async fn change_password(
        &self,
        username: &str,
        current: &str,
        new: &str,
        confirm: &str,
    ) -> Result<(), ChangeError> {
        let started = Instant::now();
        let username = username.trim();
        let result = self.apply(username, current, new, confirm).await;

        info!(
            target: "audit",
            username,
            elapsed_ms = started.elapsed().as_millis() as u64,
            outcome = match &result {
                Ok(()) => "success",
                Err(e) => e.error_code(),
            },
            "Password change"
        );
        result
    }

    async fn apply(
        &self,
        username: &str,
        current: &str,
        new: &str,
        confirm: &str,
    ) -> Result<(), ChangeError> {
        if new != confirm {
            return Err(ChangeError::ConfirmationMismatch);
        }

        // Before the lookup: the reply must not depend on whether the account exists.
        self.check_policy(new, &OwnerHints::for_username(username))?;

        let mut account = self
            .accounts
            .find_by_username(username)
            .await?
            .ok_or_else(|| ChangeError::AccountNotFound {
                username: username.to_string(),
            })?;

        self.check_policy(new, &account.owner_hints())?;

        if !account.active {
            return Err(ChangeError::AccountInactive {
                username: account.username,
            });
        }

        match account.auth_mode {
            AuthMode::Directory => {
                self.directory
                    .change_secret(&account.username, current, new)
                    .await?;
            }
            AuthMode::Local => {
                let Some(hash) = account.local_secret_hash.as_deref() else {
                    return Err(ChangeError::NoLocalSecret {
                        username: account.username,
                    });
                };
                if !self.hasher.verify_blocking(current, hash).await? {
                    return Err(ChangeError::BadSecret);
                }
                account.local_secret_hash = Some(self.hasher.hash_blocking(new).await?);
                self.accounts.update(&account).await?;
            }
        }
        Ok(())
    }

    fn check_policy(&self, new: &str, hints: &OwnerHints) -> Result<(), ChangeError> {
        let evaluation = self.policy.validate(new, hints);
        if evaluation.is_valid {
            Ok(())
        } else {
            Err(ChangeError::PolicyRejected {
                violations: evaluation.violations,
            })
        }
    }
}
