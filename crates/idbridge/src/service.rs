//! The four operations exposed to embedding applications.

use idbridge_auth::{AuthenticatedUser, ChangeError, HybridAuthenticator, LoginError, PasswordChangeService};
use idbridge_core::{AccountStore, ErpRosterSource, OwnerHints, PermissionResolver};
use idbridge_directory::{Directory, DirectoryClient};
use idbridge_matching::IdentityMatcher;
use idbridge_policy::{PasswordPolicyEngine, PolicyEvaluation};
use idbridge_reconcile::{
    ReconcileError, ReconcileOptions, ReconciliationOrchestrator, ReconciliationReport,
};
use std::sync::Arc;
use tracing::info;

use crate::config::IdbridgeConfig;
use crate::error::ServiceError;

/// External systems the engine reads from and writes to.
#[derive(Clone)]
pub struct Collaborators {
    pub erp: Arc<dyn ErpRosterSource>,
    pub accounts: Arc<dyn AccountStore>,
    pub permissions: Arc<dyn PermissionResolver>,
}

/// Hybrid authentication, password changes and reconciliation over one
/// directory and one account store.
pub struct IdentityService {
    authenticator: HybridAuthenticator,
    password_changes: PasswordChangeService,
    policy: PasswordPolicyEngine,
    reconciler: ReconciliationOrchestrator,
}

impl std::fmt::Debug for IdentityService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityService")
            .field("policy", &self.policy)
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

impl IdentityService {
    /// Build the service with an LDAP [`DirectoryClient`].
    pub fn connect(config: IdbridgeConfig, collaborators: Collaborators) -> Result<Self, ServiceError> {
        config.validate()?;
        let policy = PasswordPolicyEngine::new(config.password_policy.clone());
        let directory = DirectoryClient::new(
            config.directory.clone(),
            config.password_change.clone(),
            policy,
        )?;
        info!(directory = ?directory, "Directory client ready");
        Self::with_directory(config, collaborators, Arc::new(directory))
    }

    /// Build the service over any [`Directory`] implementation.
    pub fn with_directory(
        config: IdbridgeConfig,
        collaborators: Collaborators,
        directory: Arc<dyn Directory>,
    ) -> Result<Self, ServiceError> {
        config.password_policy.validate()?;
        let policy = PasswordPolicyEngine::new(config.password_policy);
        let matcher = IdentityMatcher::new(config.matcher);

        let authenticator = HybridAuthenticator::new(
            Arc::clone(&directory),
            Arc::clone(&collaborators.accounts),
            collaborators.permissions,
            matcher.clone(),
        );
        let password_changes = PasswordChangeService::new(
            Arc::clone(&directory),
            Arc::clone(&collaborators.accounts),
            policy.clone(),
        );
        let reconciler = ReconciliationOrchestrator::new(
            collaborators.erp,
            collaborators.accounts,
            directory,
            matcher,
            config.reconcile,
        )?;

        Ok(Self {
            authenticator,
            password_changes,
            policy,
            reconciler,
        })
    }

    /// Directory first, local secret second. Failures carry a user-safe
    /// [`LoginError::public_message`].
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthenticatedUser, LoginError> {
        self.authenticator.authenticate(username, password).await
    }

    pub async fn change_password(
        &self,
        username: &str,
        current: &str,
        new: &str,
        confirm: &str,
    ) -> Result<(), ChangeError> {
        self.password_changes
            .change_password(username, current, new, confirm)
            .await
    }

    /// Check a candidate password without changing anything.
    #[must_use]
    pub fn validate_password_policy(&self, password: &str, hints: &OwnerHints) -> PolicyEvaluation {
        self.policy.validate(password, hints)
    }

    pub async fn run_reconciliation(
        &self,
        options: ReconcileOptions,
    ) -> Result<ReconciliationReport, ReconcileError> {
        self.reconciler.run(options).await
    }

    #[must_use]
    pub fn reconciler(&self) -> &ReconciliationOrchestrator {
        &self.reconciler
    }
}
