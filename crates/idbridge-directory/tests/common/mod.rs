//! In-process fake directory for client tests.

#![allow(dead_code)]

use async_trait::async_trait;
use idbridge_directory::{
    DirectoryConfig, DirectoryError, DirectoryFlavor, DirectoryResult, DirectorySession,
    PasswordChangeConfig, RawEntry, SessionFactory, Transport,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BASE_DN: &str = "DC=corp,DC=example";
pub const SERVICE_DN: &str = "CN=svc-idbridge,OU=Service,DC=corp,DC=example";
pub const SERVICE_PASSWORD: &str = "svc-Secret-1";

/// A user held by the fake directory.
#[derive(Debug, Clone)]
pub struct FakeUser {
    pub username: String,
    pub password: String,
    pub entry: RawEntry,
}

impl FakeUser {
    pub fn new(username: &str, given: &str, surname: &str, password: &str) -> Self {
        let dn = format!("CN={given} {surname},OU=Staff,{BASE_DN}");
        let entry = RawEntry::new(dn)
            .with_attr("sAMAccountName", username)
            .with_attr("givenName", given)
            .with_attr("sn", surname)
            .with_attr("mail", format!("{username}@corp.example"))
            .with_attr("memberOf", format!("CN=Staff,OU=Groups,{BASE_DN}"));
        Self {
            username: username.to_string(),
            password: password.to_string(),
            entry,
        }
    }

    fn upn(&self) -> String {
        format!("{}@corp.example", self.username)
    }
}

#[derive(Default)]
struct State {
    users: Vec<FakeUser>,
    down: HashSet<Transport>,
    hanging: HashSet<Transport>,
    failing_writes: HashSet<Transport>,
    reject_writes: bool,
    drop_writes: bool,
    allow_anonymous: bool,
}

/// Fake directory with per-transport behavior and call counters.
#[derive(Clone, Default)]
pub struct FakeDirectory {
    state: Arc<Mutex<State>>,
    opens: Arc<AtomicUsize>,
    sessions: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
    binds: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
}

impl FakeDirectory {
    pub fn new(users: Vec<FakeUser>) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().users = users;
        fake
    }

    pub fn transport_down(&self, transport: Transport) {
        self.state.lock().unwrap().down.insert(transport);
    }

    pub fn transport_hangs(&self, transport: Transport) {
        self.state.lock().unwrap().hanging.insert(transport);
    }

    pub fn write_fails_over(&self, transport: Transport) {
        self.state.lock().unwrap().failing_writes.insert(transport);
    }

    pub fn reject_writes(&self) {
        self.state.lock().unwrap().reject_writes = true;
    }

    /// Writes report success without changing anything.
    pub fn drop_writes(&self) {
        self.state.lock().unwrap().drop_writes = true;
    }

    pub fn allow_anonymous(&self) {
        self.state.lock().unwrap().allow_anonymous = true;
    }

    pub fn set_password(&self, username: &str, password: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(user) = state.users.iter_mut().find(|u| u.username == username) {
            user.password = password.to_string();
        }
    }

    pub fn password_of(&self, username: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .users
            .iter()
            .find(|u| u.username == username)
            .map(|u| u.password.clone())
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Sessions successfully opened.
    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }

    /// Sessions dropped.
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn binds(&self) -> usize {
        self.binds.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for FakeDirectory {
    async fn open(&self, transport: Transport) -> DirectoryResult<Box<dyn DirectorySession>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let (down, hangs) = {
            let state = self.state.lock().unwrap();
            (
                state.down.contains(&transport),
                state.hanging.contains(&transport),
            )
        };
        if down {
            return Err(DirectoryError::unavailable(format!(
                "connection refused over {transport}"
            )));
        }

        self.sessions.fetch_add(1, Ordering::SeqCst);
        let session = FakeSession {
            directory: self.clone(),
            transport,
            bound_as: None,
        };
        if hangs {
            // The session exists while the server stalls; a cancelled attempt
            // must still release it.
            let _held = session;
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!("hanging transport never completes");
        }
        Ok(Box::new(session))
    }
}

struct FakeSession {
    directory: FakeDirectory,
    transport: Transport,
    bound_as: Option<String>,
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.directory.releases.fetch_add(1, Ordering::SeqCst);
    }
}

fn filter_value(filter: &str, attribute: &str) -> Option<String> {
    let needle = format!("({attribute}=");
    let start = filter.rfind(&needle)? + needle.len();
    let rest = &filter[start..];
    let end = rest.find(')')?;
    Some(rest[..end].to_string())
}

#[async_trait]
impl DirectorySession for FakeSession {
    async fn bind(&mut self, bind_name: &str, secret: &str) -> DirectoryResult<()> {
        self.directory.binds.fetch_add(1, Ordering::SeqCst);
        if bind_name == SERVICE_DN && secret == SERVICE_PASSWORD {
            self.bound_as = Some(bind_name.to_string());
            return Ok(());
        }

        let state = self.directory.state.lock().unwrap();
        let matched = state.users.iter().any(|user| {
            (user.upn() == bind_name || user.entry.dn == bind_name) && user.password == secret
        });
        if matched {
            self.bound_as = Some(bind_name.to_string());
            Ok(())
        } else {
            Err(DirectoryError::AuthFailed)
        }
    }

    async fn search(
        &mut self,
        _base: &str,
        filter: &str,
        _attrs: &[&str],
        size_limit: usize,
    ) -> DirectoryResult<Vec<RawEntry>> {
        let state = self.directory.state.lock().unwrap();
        if self.bound_as.is_none() && !state.allow_anonymous {
            return Err(DirectoryError::operation_failed(
                "search failed with code 50: insufficient access",
            ));
        }

        let wanted = filter_value(filter, "sAMAccountName").unwrap_or_else(|| "*".to_string());
        Ok(state
            .users
            .iter()
            .filter(|user| wanted == "*" || user.username.eq_ignore_ascii_case(&wanted))
            .take(size_limit)
            .map(|user| user.entry.clone())
            .collect())
    }

    async fn change_password(
        &mut self,
        dn: &str,
        old_secret: &str,
        new_secret: &str,
        _flavor: DirectoryFlavor,
    ) -> DirectoryResult<()> {
        self.directory.writes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.directory.state.lock().unwrap();
        if state.failing_writes.contains(&self.transport) {
            return Err(DirectoryError::operation_failed(format!(
                "write over {} failed with code 53",
                self.transport
            )));
        }
        if state.reject_writes {
            return Err(DirectoryError::ChangeRejected {
                message: "password history".to_string(),
            });
        }
        let drop_writes = state.drop_writes;
        let Some(user) = state.users.iter_mut().find(|u| u.entry.dn == dn) else {
            return Err(DirectoryError::operation_failed("no such object"));
        };
        if user.password != old_secret {
            return Err(DirectoryError::AuthFailed);
        }
        if !drop_writes {
            user.password = new_secret.to_string();
        }
        Ok(())
    }

    async fn unbind(&mut self) -> DirectoryResult<()> {
        self.bound_as = None;
        Ok(())
    }
}

pub fn maria() -> FakeUser {
    FakeUser::new("mlopez", "Maria", "Lopez", "Old-Secret-9x")
}

pub fn juan() -> FakeUser {
    FakeUser::new("jperez", "Juan", "Perez", "Juan-Secret-7q")
}

pub fn config() -> DirectoryConfig {
    DirectoryConfig::new("dc1.corp.example", BASE_DN)
        .with_user_container("OU=Staff")
        .with_strategy_timeout(Duration::from_millis(200))
}

pub fn change_config() -> PasswordChangeConfig {
    PasswordChangeConfig::default().with_verification(2, Duration::from_millis(10))
}
