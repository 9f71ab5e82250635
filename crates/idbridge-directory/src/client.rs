//! Directory client
//!
//! Authentication, roster enumeration and verified password changes over an
//! ordered set of fallback strategies.

use async_trait::async_trait;
use idbridge_core::{DirectoryIdentity, OwnerHints};
use idbridge_policy::PasswordPolicyEngine;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::change::{ChangeRequest, HelperProcessStrategy, HttpApiStrategy, LdapWriteStrategy};
use crate::config::{DirectoryConfig, PasswordChangeConfig, Transport};
use crate::error::{DirectoryError, DirectoryResult};
use crate::escape;
use crate::ldap::LdapSessionFactory;
use crate::mapping::{map_entries, map_entry, IDENTITY_ATTRIBUTES};
use crate::session::{with_session, SessionFactory};
use crate::strategy::{FallThrough, FallbackChain, Strategy};

/// Directory operations used by the authenticator and the orchestrator.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Bind as the user. Rejected credentials are [`DirectoryError::AuthFailed`];
    /// an unreachable directory is never reported as bad credentials.
    async fn authenticate(&self, username: &str, secret: &str) -> DirectoryResult<DirectoryIdentity>;

    /// Every person entry. Returns an empty list when the directory cannot be
    /// reached.
    async fn fetch_all_identities(&self) -> Vec<DirectoryIdentity>;

    /// Change the user's password and verify the new one authenticates.
    async fn change_secret(
        &self,
        username: &str,
        old_secret: &str,
        new_secret: &str,
    ) -> DirectoryResult<()>;
}

/// Credentials presented to a bind strategy.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"***REDACTED***")
            .finish()
    }
}

/// Bind as the user over one transport, then read the user's entry.
struct UserBindStrategy {
    factory: Arc<dyn SessionFactory>,
    config: Arc<DirectoryConfig>,
    transport: Transport,
}

#[async_trait]
impl Strategy<Credentials, DirectoryIdentity> for UserBindStrategy {
    fn label(&self) -> String {
        format!("user-bind/{}", self.transport)
    }

    async fn attempt(&self, ctx: &Credentials) -> DirectoryResult<DirectoryIdentity> {
        let bind_name = self.config.bind_name(&ctx.username);
        let base = self.config.users_base();
        let attribute = self.config.user_attribute().to_string();
        let filter = escape::user_filter(&self.config.user_filter(), &attribute, &ctx.username);
        let username = ctx.username.clone();
        let secret = ctx.secret.clone();

        with_session(self.factory.as_ref(), self.transport, move |session| {
            Box::pin(async move {
                session.bind(&bind_name, &secret).await?;

                // The bind already proved the credentials; a failed lookup only
                // costs the profile attributes.
                let entries = match session.search(&base, &filter, IDENTITY_ATTRIBUTES, 1).await {
                    Ok(entries) => entries,
                    Err(e) => {
                        debug!(username = %username, error = %e, "User entry lookup failed");
                        Vec::new()
                    }
                };

                Ok(entries
                    .first()
                    .and_then(|entry| map_entry(entry, &attribute))
                    .unwrap_or_else(|| DirectoryIdentity::new(username)))
            })
        })
        .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchAccount {
    Service,
    Anonymous,
}

/// Enumerate person entries over one transport.
struct RosterSearchStrategy {
    factory: Arc<dyn SessionFactory>,
    config: Arc<DirectoryConfig>,
    transport: Transport,
    account: SearchAccount,
}

#[async_trait]
impl Strategy<(), Vec<DirectoryIdentity>> for RosterSearchStrategy {
    fn label(&self) -> String {
        match self.account {
            SearchAccount::Service => format!("service-search/{}", self.transport),
            SearchAccount::Anonymous => format!("anonymous-search/{}", self.transport),
        }
    }

    async fn attempt(&self, _ctx: &()) -> DirectoryResult<Vec<DirectoryIdentity>> {
        let service = match self.account {
            SearchAccount::Service => Some((
                self.config.service_bind_dn.clone().unwrap_or_default(),
                self.config.service_bind_password.clone().unwrap_or_default(),
            )),
            SearchAccount::Anonymous => None,
        };
        let base = self.config.users_base();
        let filter = self.config.user_filter();
        let attribute = self.config.user_attribute().to_string();
        let size_limit = self.config.size_limit;

        with_session(self.factory.as_ref(), self.transport, move |session| {
            Box::pin(async move {
                if let Some((bind_dn, password)) = service {
                    session.bind(&bind_dn, &password).await?;
                }
                let entries = session
                    .search(&base, &filter, IDENTITY_ATTRIBUTES, size_limit)
                    .await?;
                Ok(map_entries(&entries, &attribute))
            })
        })
        .await
    }
}

/// Directory client over LDAP with fallback transports.
pub struct DirectoryClient {
    config: Arc<DirectoryConfig>,
    change_config: PasswordChangeConfig,
    policy: PasswordPolicyEngine,
    bind_chain: FallbackChain<Credentials, DirectoryIdentity>,
    roster_chain: FallbackChain<(), Vec<DirectoryIdentity>>,
    write_chain: FallbackChain<ChangeRequest, ()>,
}

impl std::fmt::Debug for DirectoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryClient")
            .field("config", &self.config)
            .field("change_config", &self.change_config)
            .field("bind_chain", &self.bind_chain.labels())
            .field("roster_chain", &self.roster_chain.labels())
            .field("write_chain", &self.write_chain.labels())
            .finish()
    }
}

impl DirectoryClient {
    /// Create a client that talks LDAP through `ldap3`.
    pub fn new(
        config: DirectoryConfig,
        change_config: PasswordChangeConfig,
        policy: PasswordPolicyEngine,
    ) -> DirectoryResult<Self> {
        let config = Arc::new(config);
        let factory = Arc::new(LdapSessionFactory::new(Arc::clone(&config)));
        Self::with_factory(config, change_config, policy, factory)
    }

    /// Create a client over a custom session factory.
    pub fn with_factory(
        config: Arc<DirectoryConfig>,
        change_config: PasswordChangeConfig,
        policy: PasswordPolicyEngine,
        factory: Arc<dyn SessionFactory>,
    ) -> DirectoryResult<Self> {
        config.validate()?;
        change_config.validate()?;
        let timeout = config.strategy_timeout();

        let mut bind_chain = FallbackChain::<Credentials, DirectoryIdentity>::new("bind", timeout);
        for &transport in &config.transports {
            bind_chain = bind_chain.with(Arc::new(UserBindStrategy {
                factory: Arc::clone(&factory),
                config: Arc::clone(&config),
                transport,
            }));
        }

        // Search failures of any kind move on: a rejected service account
        // still leaves the anonymous search.
        let mut roster_chain = FallbackChain::<(), Vec<DirectoryIdentity>>::new("roster", timeout)
            .falling_through(FallThrough::Always);
        let mut accounts = Vec::with_capacity(2);
        if config.has_service_account() {
            accounts.push(SearchAccount::Service);
        }
        accounts.push(SearchAccount::Anonymous);
        for account in accounts {
            for &transport in &config.transports {
                roster_chain = roster_chain.with(Arc::new(RosterSearchStrategy {
                    factory: Arc::clone(&factory),
                    config: Arc::clone(&config),
                    transport,
                    account,
                }));
            }
        }

        let mut write_chain = FallbackChain::<ChangeRequest, ()>::new("password-write", timeout);
        for transport in [Transport::Ldaps, Transport::StartTls] {
            if config.transports.contains(&transport) {
                write_chain = write_chain.with(Arc::new(LdapWriteStrategy::new(
                    Arc::clone(&factory),
                    transport,
                    config.flavor,
                )));
            }
        }
        if let Some(program) = &change_config.helper_program {
            write_chain = write_chain.with(Arc::new(HelperProcessStrategy::new(
                program.clone(),
                change_config.helper_args.clone(),
            )));
        }
        if let Some(url) = &change_config.api_url {
            write_chain = write_chain.with(Arc::new(HttpApiStrategy::new(
                url.clone(),
                change_config.api_token.clone(),
                timeout,
            )?));
        }
        if write_chain.is_empty() {
            return Err(DirectoryError::invalid_configuration(
                "no password write strategy available: enable an encrypted transport, a helper or an API",
            ));
        }

        Ok(Self {
            config,
            change_config,
            policy,
            bind_chain,
            roster_chain,
            write_chain,
        })
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Labels of the password write strategies, in the order they are tried.
    pub fn write_strategies(&self) -> Vec<String> {
        self.write_chain.labels()
    }

    async fn verify_new_secret(&self, username: &str, new_secret: &str) -> DirectoryResult<()> {
        let attempts = self.change_config.verify_attempts;
        for attempt in 1..=attempts {
            match self.bind_chain.run(&credentials(username, new_secret)).await {
                Ok(_) => {
                    debug!(username, attempt, "New password verified");
                    return Ok(());
                }
                Err(e) => {
                    warn!(username, attempt, error = %e, "New password did not authenticate");
                    if attempt < attempts {
                        tokio::time::sleep(self.change_config.verify_delay()).await;
                    }
                }
            }
        }

        Err(DirectoryError::ChangeUnverified {
            username: username.to_string(),
            attempts,
        })
    }
}

fn credentials(username: &str, secret: &str) -> Credentials {
    Credentials {
        username: username.to_string(),
        secret: secret.to_string(),
    }
}

fn audit_outcome<T>(result: &DirectoryResult<T>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(e) => e.error_code(),
    }
}

#[async_trait]
impl Directory for DirectoryClient {
    #[instrument(skip(self, secret))]
    async fn authenticate(&self, username: &str, secret: &str) -> DirectoryResult<DirectoryIdentity> {
        let username = username.trim();
        // An LDAP simple bind with an empty password is an anonymous bind.
        if username.is_empty() || secret.is_empty() {
            info!(
                target: "audit",
                username,
                outcome = "rejected",
                "Directory authentication refused empty credentials"
            );
            return Err(DirectoryError::AuthFailed);
        }

        let started = Instant::now();
        let result = self.bind_chain.run(&credentials(username, secret)).await;
        info!(
            target: "audit",
            username,
            elapsed_ms = started.elapsed().as_millis() as u64,
            outcome = audit_outcome(&result),
            "Directory authentication"
        );
        result
    }

    #[instrument(skip(self))]
    async fn fetch_all_identities(&self) -> Vec<DirectoryIdentity> {
        let started = Instant::now();
        match self.roster_chain.run(&()).await {
            Ok(identities) => {
                info!(
                    count = identities.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Fetched directory roster"
                );
                identities
            }
            Err(e) => {
                warn!(
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Directory roster unavailable, continuing without it"
                );
                Vec::new()
            }
        }
    }

    #[instrument(skip(self, old_secret, new_secret))]
    async fn change_secret(
        &self,
        username: &str,
        old_secret: &str,
        new_secret: &str,
    ) -> DirectoryResult<()> {
        let started = Instant::now();
        let username = username.trim();

        let evaluation = self
            .policy
            .validate(new_secret, &OwnerHints::for_username(username));
        if !evaluation.is_valid {
            let result: DirectoryResult<()> = Err(DirectoryError::PolicyRejected {
                violations: evaluation.violations.iter().map(ToString::to_string).collect(),
            });
            info!(
                target: "audit",
                username,
                elapsed_ms = started.elapsed().as_millis() as u64,
                outcome = audit_outcome(&result),
                "Directory password change"
            );
            return result;
        }

        let result = async {
            let identity = self.authenticate(username, old_secret).await?;
            let dn = identity
                .dn
                .ok_or_else(|| DirectoryError::UserNotFound {
                    username: username.to_string(),
                })?;

            let request = ChangeRequest {
                username: username.to_string(),
                dn,
                old_secret: old_secret.to_string(),
                new_secret: new_secret.to_string(),
            };
            self.write_chain.run(&request).await?;
            self.verify_new_secret(username, new_secret).await
        }
        .await;

        info!(
            target: "audit",
            username,
            elapsed_ms = started.elapsed().as_millis() as u64,
            outcome = audit_outcome(&result),
            "Directory password change"
        );
        result
    }
}
