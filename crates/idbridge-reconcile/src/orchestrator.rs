//! Reconciliation orchestrator.
//!
//! One run walks the ERP roster in order. Each record either updates the
//! account already linked to it or creates a new linked account. Accounts
//! whose ERP person has left the roster are deactivated afterwards. A failing
//! record is reported and the run moves on.

use chrono::{DateTime, Utc};
use idbridge_core::{
    AccountStore, AuthMode, DirectoryIdentity, ErpPersonId, ErpPersonRecord, ErpRosterSource,
    ErrorKind, LocalAccount, StoreError,
};
use idbridge_directory::Directory;
use idbridge_matching::{IdentityMatcher, MatchContext, NameQuery};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::cache::{Clock, RosterCache, SystemClock};
use crate::config::{ReconcileConfig, ReconcileOptions};
use crate::error::ReconcileError;
use crate::report::{ReconciliationReport, RecordError};
use crate::username::{base_username, unique_username};

enum Outcome {
    Created,
    Updated,
    Unchanged,
    Skipped,
}

/// Username bookkeeping for one run.
#[derive(Default)]
struct RunState {
    /// Lowercased directory usernames adopted during this run.
    claimed: HashSet<String>,
    /// Lowercased local usernames and the ERP person their account is linked to.
    holders: HashMap<String, Option<ErpPersonId>>,
    /// Lowercased directory usernames; generated usernames avoid them.
    directory_usernames: HashSet<String>,
}

impl RunState {
    fn new(accounts: &[LocalAccount], directory: &[DirectoryIdentity]) -> Self {
        Self {
            claimed: HashSet::new(),
            holders: accounts
                .iter()
                .map(|a| (a.username.to_lowercase(), a.linked_erp_id.clone()))
                .collect(),
            directory_usernames: directory
                .iter()
                .map(|d| d.username.to_lowercase())
                .collect(),
        }
    }

    /// Whether `erp_id` may adopt `identity`.
    ///
    /// An identity is adopted at most once per run, and never when its
    /// username belongs to an account of someone else.
    fn is_eligible(&self, identity: &DirectoryIdentity, erp_id: &ErpPersonId) -> bool {
        let key = identity.username.to_lowercase();
        if self.claimed.contains(&key) {
            return false;
        }
        match self.holders.get(&key) {
            None => true,
            Some(holder) => holder.as_ref() == Some(erp_id),
        }
    }

    fn generated_username(&self, given_name: &str, surname: &str) -> String {
        let taken: HashSet<String> = self
            .holders
            .keys()
            .chain(self.directory_usernames.iter())
            .cloned()
            .collect();
        unique_username(&base_username(given_name, surname), &taken)
    }

    fn record_username(&mut self, previous: Option<&str>, account: &LocalAccount) {
        if let Some(previous) = previous {
            self.holders.remove(&previous.to_lowercase());
        }
        self.holders.insert(
            account.username.to_lowercase(),
            account.linked_erp_id.clone(),
        );
    }
}

/// Equal apart from the sync timestamp.
fn materially_equal(a: &LocalAccount, b: &LocalAccount) -> bool {
    let mut a = a.clone();
    a.last_sync_at = b.last_sync_at;
    a == *b
}

fn adopt(account: &mut LocalAccount, identity: &DirectoryIdentity) {
    account.username = identity.username.clone();
    if let Some(email) = identity.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
        account.email = email.to_string();
    }
    account.auth_mode = AuthMode::Directory;
}

/// Batch synchronization of the ERP roster, local accounts and the directory.
///
/// Runs are single-flight: a second call waits for the first to finish.
pub struct ReconciliationOrchestrator {
    erp: Arc<dyn ErpRosterSource>,
    accounts: Arc<dyn AccountStore>,
    directory: Arc<dyn Directory>,
    matcher: IdentityMatcher,
    config: ReconcileConfig,
    clock: Arc<dyn Clock>,
    cache: RosterCache,
    run_lock: Mutex<()>,
}

impl std::fmt::Debug for ReconciliationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationOrchestrator")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl ReconciliationOrchestrator {
    pub fn new(
        erp: Arc<dyn ErpRosterSource>,
        accounts: Arc<dyn AccountStore>,
        directory: Arc<dyn Directory>,
        matcher: IdentityMatcher,
        config: ReconcileConfig,
    ) -> Result<Self, ReconcileError> {
        config.validate()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let cache = RosterCache::new(Arc::clone(&clock), config.roster_cache_ttl());
        Ok(Self {
            erp,
            accounts,
            directory,
            matcher,
            config,
            clock,
            cache,
            run_lock: Mutex::new(()),
        })
    }

    /// Replace the clock used for sync timestamps and roster cache expiry.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.cache = RosterCache::new(Arc::clone(&clock), self.config.roster_cache_ttl());
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn roster_cache(&self) -> &RosterCache {
        &self.cache
    }

    /// Run one reconciliation.
    ///
    /// Fails only when the ERP roster or the account list cannot be read.
    /// Everything after that is reported per record.
    #[instrument(skip(self))]
    pub async fn run(
        &self,
        options: ReconcileOptions,
    ) -> Result<ReconciliationReport, ReconcileError> {
        let _single_flight = self.run_lock.lock().await;
        let started = Instant::now();
        let mut report = ReconciliationReport::new(self.clock.now());

        let roster = self
            .erp
            .fetch_erp_roster()
            .await
            .map_err(|source| ReconcileError::Roster { source })?;
        if roster.is_empty() && !self.config.allow_empty_roster {
            return Err(ReconcileError::EmptyRoster);
        }

        let accounts = self
            .accounts
            .list()
            .await
            .map_err(|source| ReconcileError::Accounts { source })?;

        let (directory, cached) = self.directory_roster(options.force_full).await;
        report.erp_roster_size = roster.len();
        report.directory_roster_size = directory.len();
        report.directory_roster_cached = cached;

        let mut state = RunState::new(&accounts, &directory);
        let mut linked: HashMap<ErpPersonId, LocalAccount> = accounts
            .into_iter()
            .filter_map(|a| a.linked_erp_id.clone().map(|id| (id, a)))
            .collect();

        let mut seen: HashSet<ErpPersonId> = HashSet::with_capacity(roster.len());
        for record in &roster {
            let erp_id = &record.external_person_id;
            if !seen.insert(erp_id.clone()) {
                warn!(erp_person_id = %erp_id, "Duplicate ERP person id in roster");
                report.errors.push(RecordError {
                    erp_person_id: Some(erp_id.clone()),
                    account_id: None,
                    kind: ErrorKind::Configuration,
                    message: "duplicate ERP person id in roster".to_string(),
                });
                continue;
            }

            match self
                .reconcile_record(record, &mut linked, &directory, &mut state, options)
                .await
            {
                Ok(Outcome::Created) => report.created += 1,
                Ok(Outcome::Updated) => report.updated += 1,
                Ok(Outcome::Unchanged) => report.unchanged += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    warn!(erp_person_id = %erp_id, error = %e, "Failed to reconcile ERP record");
                    report.errors.push(RecordError {
                        erp_person_id: Some(erp_id.clone()),
                        account_id: linked.get(erp_id).map(|a| a.id),
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                }
            }
        }

        self.deactivate_departed(&linked, &seen, &mut report).await;

        report.finish(started.elapsed());
        info!(
            target: "audit",
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            skipped = report.skipped,
            deactivated = report.deactivated,
            errors = report.errors.len(),
            erp_roster_size = report.erp_roster_size,
            directory_roster_size = report.directory_roster_size,
            directory_roster_cached = report.directory_roster_cached,
            elapsed_ms = report.duration_ms,
            "Reconciliation run"
        );
        Ok(report)
    }

    async fn directory_roster(&self, force_full: bool) -> (Arc<Vec<DirectoryIdentity>>, bool) {
        if force_full {
            self.cache.invalidate();
        } else if let Some(cached) = self.cache.get() {
            debug!(identities = cached.len(), "Using cached directory roster");
            return (cached, true);
        }

        let fresh = self.directory.fetch_all_identities().await;
        if fresh.is_empty() {
            warn!("Directory roster is empty; no directory identities will be adopted");
        }
        (self.cache.store(fresh), false)
    }

    async fn reconcile_record(
        &self,
        record: &ErpPersonRecord,
        linked: &mut HashMap<ErpPersonId, LocalAccount>,
        directory: &[DirectoryIdentity],
        state: &mut RunState,
        options: ReconcileOptions,
    ) -> Result<Outcome, StoreError> {
        let now = self.clock.now();
        match linked.get(&record.external_person_id).cloned() {
            Some(snapshot) => {
                // Logins and password changes may have written the account
                // since the run listed it.
                let current = self
                    .accounts
                    .find_by_linked_erp_id(&record.external_person_id)
                    .await?
                    .unwrap_or_else(|| snapshot.clone());
                if current.username != snapshot.username {
                    state.record_username(Some(&snapshot.username), &current);
                }
                let (outcome, account) = self
                    .update_account(record, &current, directory, state, now)
                    .await?;
                linked.insert(record.external_person_id.clone(), account);
                Ok(outcome)
            }
            None if options.only_active && !record.active => {
                debug!(erp_person_id = %record.external_person_id, "Skipping inactive ERP record");
                Ok(Outcome::Skipped)
            }
            None => {
                let account = self.create_account(record, directory, state, now).await?;
                linked.insert(record.external_person_id.clone(), account);
                Ok(Outcome::Created)
            }
        }
    }

    async fn update_account(
        &self,
        record: &ErpPersonRecord,
        existing: &LocalAccount,
        directory: &[DirectoryIdentity],
        state: &mut RunState,
        now: DateTime<Utc>,
    ) -> Result<(Outcome, LocalAccount), StoreError> {
        let (given_name, surname) = record.split_name();
        let mut next = existing.clone();
        next.given_name = given_name;
        next.surname = surname;
        next.full_name_source_erp = Some(record.full_name.clone());
        next.active = record.active;

        let adopted = self.identity_for_existing(record, existing, directory, state);
        if let Some(identity) = adopted {
            adopt(&mut next, identity);
        }
        next.last_sync_at = Some(now);

        let changed = !materially_equal(&next, existing);
        self.accounts.update(&next).await?;

        if let Some(identity) = adopted {
            state.claimed.insert(identity.username.to_lowercase());
        }
        state.record_username(Some(&existing.username), &next);

        if changed {
            info!(
                target: "audit",
                account_id = %next.id,
                erp_person_id = %record.external_person_id,
                username = %next.username,
                previous_username = %existing.username,
                auth_mode = ?next.auth_mode,
                active = next.active,
                "Updated account from ERP record"
            );
            Ok((Outcome::Updated, next))
        } else {
            Ok((Outcome::Unchanged, next))
        }
    }

    /// The directory identity an already linked account should carry.
    ///
    /// A directory-mode account keeps its identity while the roster still
    /// lists its username. An empty roster yields nothing, so an unreachable
    /// directory never changes an account.
    fn identity_for_existing<'a>(
        &self,
        record: &ErpPersonRecord,
        existing: &LocalAccount,
        directory: &'a [DirectoryIdentity],
        state: &RunState,
    ) -> Option<&'a DirectoryIdentity> {
        if existing.auth_mode == AuthMode::Directory {
            let current = directory.iter().find(|d| {
                d.username.eq_ignore_ascii_case(&existing.username)
                    && state.is_eligible(d, &record.external_person_id)
            });
            if current.is_some() {
                return current;
            }
        }
        self.match_directory(record, directory, state)
    }

    fn match_directory<'a>(
        &self,
        record: &ErpPersonRecord,
        directory: &'a [DirectoryIdentity],
        state: &RunState,
    ) -> Option<&'a DirectoryIdentity> {
        if directory.is_empty() {
            return None;
        }
        let eligible: Vec<&DirectoryIdentity> = directory
            .iter()
            .filter(|d| state.is_eligible(d, &record.external_person_id))
            .collect();

        let query = NameQuery::from_full_name(record.full_name.as_str());
        let result = self
            .matcher
            .match_in(MatchContext::Batch, &query, eligible.iter().copied());
        debug!(
            erp_person_id = %record.external_person_id,
            confidence = %result.confidence,
            score = ?result.score(),
            rationale = %result.rationale,
            "Directory match"
        );

        if self.config.require_confident_match {
            result.confident_record()
        } else {
            result.record()
        }
    }

    async fn create_account(
        &self,
        record: &ErpPersonRecord,
        directory: &[DirectoryIdentity],
        state: &mut RunState,
        now: DateTime<Utc>,
    ) -> Result<LocalAccount, StoreError> {
        let (given_name, surname) = record.split_name();
        let matched = self.match_directory(record, directory, state);

        let mut account = match matched {
            Some(identity) => {
                let email = format!("{}@{}", identity.username, self.config.email_domain.trim());
                let mut account = LocalAccount::new(
                    identity.username.clone(),
                    email,
                    given_name,
                    surname,
                );
                adopt(&mut account, identity);
                account
            }
            None => {
                let username = state.generated_username(&given_name, &surname);
                let email = format!("{username}@{}", self.config.email_domain.trim());
                LocalAccount::new(username, email, given_name, surname)
            }
        };
        account.linked_erp_id = Some(record.external_person_id.clone());
        account.full_name_source_erp = Some(record.full_name.clone());
        account.active = record.active;
        account.last_sync_at = Some(now);

        let account = self.accounts.create(account).await?;

        if let Some(identity) = matched {
            state.claimed.insert(identity.username.to_lowercase());
        }
        state.record_username(None, &account);

        info!(
            target: "audit",
            account_id = %account.id,
            erp_person_id = %record.external_person_id,
            username = %account.username,
            auth_mode = ?account.auth_mode,
            "Created account for ERP record"
        );
        Ok(account)
    }

    async fn deactivate_departed(
        &self,
        linked: &HashMap<ErpPersonId, LocalAccount>,
        roster_ids: &HashSet<ErpPersonId>,
        report: &mut ReconciliationReport,
    ) {
        let now = self.clock.now();
        let mut departed: Vec<(&ErpPersonId, &LocalAccount)> = linked
            .iter()
            .filter(|(erp_id, account)| account.active && !roster_ids.contains(*erp_id))
            .collect();
        departed.sort_by(|a, b| a.1.username.cmp(&b.1.username));

        for (erp_id, snapshot) in departed {
            let current = match self.accounts.find_by_linked_erp_id(erp_id).await {
                Ok(Some(current)) => current,
                Ok(None) => {
                    debug!(account_id = %snapshot.id, "Departed account was unlinked during the run");
                    continue;
                }
                Err(e) => {
                    warn!(account_id = %snapshot.id, error = %e, "Failed to reload departed account");
                    report.errors.push(RecordError {
                        erp_person_id: Some(erp_id.clone()),
                        account_id: Some(snapshot.id),
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            if !current.active {
                continue;
            }
            let mut next = current;
            next.active = false;
            next.last_sync_at = Some(now);

            match self.accounts.update(&next).await {
                Ok(()) => {
                    report.deactivated += 1;
                    info!(
                        target: "audit",
                        account_id = %next.id,
                        erp_person_id = ?next.linked_erp_id,
                        username = %next.username,
                        "Deactivated account no longer in ERP roster"
                    );
                }
                Err(e) => {
                    warn!(account_id = %next.id, error = %e, "Failed to deactivate account");
                    report.errors.push(RecordError {
                        erp_person_id: next.linked_erp_id.clone(),
                        account_id: Some(next.id),
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}
