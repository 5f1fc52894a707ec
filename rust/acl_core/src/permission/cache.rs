//! Concurrent per-user permission cache.
//!
//! Sets are shared as `Arc<UserPermissionSet>` snapshots. Writers clone the
//! set under the DashMap shard lock, mutate the clone and swap it in, so a
//! reader holding a snapshot never observes a half-applied update.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};

use super::UserPermissionSet;
use crate::config::AclConfig;
use crate::types::UserId;

/// Time source for expiry checks.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
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
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now = now.checked_add_signed(by).unwrap_or(DateTime::<Utc>::MAX_UTC);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Counters for [`PermissionCache::get_valid`] lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Per-user [`UserPermissionSet`] store.
pub struct PermissionCache {
    sets: DashMap<UserId, Arc<UserPermissionSet>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl fmt::Debug for PermissionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionCache")
            .field("entries", &self.sets.len())
            .field("ttl", &self.ttl)
            .field("clock", &self.clock)
            .finish()
    }
}

impl Default for PermissionCache {
    fn default() -> Self {
        Self::from_config(&AclConfig::default())
    }
}

impl PermissionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sets: DashMap::new(),
            ttl,
            clock: Arc::new(SystemClock),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &AclConfig) -> Self {
        Self::new(config.cache_ttl())
    }

    /// Replace the time source. Intended for construction time.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Empty set for `user_id` starting now with the cache TTL.
    pub fn new_set(&self, user_id: UserId) -> UserPermissionSet {
        UserPermissionSet::new(user_id, self.now(), self.ttl)
    }

    /// Snapshot of the user's set, expired or not. Not counted in stats.
    pub fn get(&self, user_id: UserId) -> Option<Arc<UserPermissionSet>> {
        self.sets.get(&user_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Snapshot of the user's set if present and unexpired.
    pub fn get_valid(&self, user_id: UserId) -> Option<Arc<UserPermissionSet>> {
        let now = self.now();
        let found = self
            .sets
            .get(&user_id)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| Arc::clone(entry.value()));
        match found {
            Some(set) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(user_id, version = set.version(), "permission set cache hit");
                Some(set)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store `set`, replacing any previous set for the same user.
    pub fn insert(&self, set: UserPermissionSet) -> Arc<UserPermissionSet> {
        let user_id = set.user_id();
        let set = Arc::new(set);
        self.sets.insert(user_id, Arc::clone(&set));
        debug!(user_id, version = set.version(), "permission set stored");
        set
    }

    /// Apply `f` to the user's set by replace-on-write. `None` if absent.
    pub fn update<F>(&self, user_id: UserId, f: F) -> Option<Arc<UserPermissionSet>>
    where
        F: FnOnce(&mut UserPermissionSet),
    {
        let mut entry = self.sets.get_mut(&user_id)?;
        f(Arc::make_mut(entry.value_mut()));
        Some(Arc::clone(entry.value()))
    }

    /// Like [`update`](Self::update), but only for an unexpired set. The
    /// expiry check and the write happen under the same shard lock.
    pub fn update_valid<F>(&self, user_id: UserId, f: F) -> Option<Arc<UserPermissionSet>>
    where
        F: FnOnce(&mut UserPermissionSet),
    {
        let now = self.now();
        let mut entry = self.sets.get_mut(&user_id)?;
        if entry.is_expired_at(now) {
            return None;
        }
        f(Arc::make_mut(entry.value_mut()));
        Some(Arc::clone(entry.value()))
    }

    /// Expire the user's set. Returns false if the user has no set.
    pub fn invalidate_user(&self, user_id: UserId) -> bool {
        let found = self.update(user_id, UserPermissionSet::invalidate).is_some();
        if found {
            debug!(user_id, "permission set invalidated");
        }
        found
    }

    /// Expire every set, returning how many were touched.
    pub fn invalidate_all(&self) -> usize {
        let mut count = 0;
        for mut entry in self.sets.iter_mut() {
            Arc::make_mut(entry.value_mut()).invalidate();
            count += 1;
        }
        debug!(count, "all permission sets invalidated");
        count
    }

    /// Drop expired sets, returning how many were removed.
    pub fn remove_expired(&self) -> usize {
        let now = self.now();
        let before = self.sets.len();
        self.sets.retain(|_, set| !set.is_expired_at(now));
        let removed = before.saturating_sub(self.sets.len());
        if removed > 0 {
            debug!(removed, "expired permission sets removed");
        }
        removed
    }

    pub fn remove(&self, user_id: UserId) -> Option<Arc<UserPermissionSet>> {
        self.sets.remove(&user_id).map(|(_, set)| set)
    }

    pub fn clear(&self) {
        self.sets.clear();
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.sets.len(),
        }
    }
}
