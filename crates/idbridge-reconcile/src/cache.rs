//! Directory roster cache.
//!
//! Holds the last non-empty directory roster for a fixed time-to-live. The
//! cache owns its clock so expiry can be tested without sleeping.

use chrono::{DateTime, Utc};
use idbridge_core::DirectoryIdentity;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let step = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += step;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Entry {
    fetched_at: DateTime<Utc>,
    identities: Arc<Vec<DirectoryIdentity>>,
}

/// Time-limited cache of the directory roster.
///
/// Empty rosters are never stored: an empty result usually means the
/// directory was unreachable.
pub struct RosterCache {
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entry: Mutex<Option<Entry>>,
}

impl std::fmt::Debug for RosterCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RosterCache")
            .field("ttl", &self.ttl)
            .field("cached", &self.len())
            .finish()
    }
}

impl RosterCache {
    /// A zero `ttl` disables caching.
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            clock,
            ttl,
            entry: Mutex::new(None),
        }
    }

    /// The cached roster, if still fresh.
    pub fn get(&self) -> Option<Arc<Vec<DirectoryIdentity>>> {
        let now = self.clock.now();
        let mut entry = self.entry.lock().unwrap_or_else(PoisonError::into_inner);
        let fresh = entry.as_ref().is_some_and(|e| {
            (now - e.fetched_at)
                .to_std()
                .is_ok_and(|age| age < self.ttl)
        });
        if fresh {
            entry.as_ref().map(|e| Arc::clone(&e.identities))
        } else {
            *entry = None;
            None
        }
    }

    /// Store a freshly fetched roster and hand it back shared.
    pub fn store(&self, identities: Vec<DirectoryIdentity>) -> Arc<Vec<DirectoryIdentity>> {
        let identities = Arc::new(identities);
        if identities.is_empty() || self.ttl.is_zero() {
            return identities;
        }
        *self.entry.lock().unwrap_or_else(PoisonError::into_inner) = Some(Entry {
            fetched_at: self.clock.now(),
            identities: Arc::clone(&identities),
        });
        identities
    }

    pub fn invalidate(&self) {
        *self.entry.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Number of cached identities, fresh or not.
    pub fn len(&self) -> usize {
        self.entry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, |e| e.identities.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
