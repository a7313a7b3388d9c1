//! Expiring counter storage.
//!
//! The limiter only talks to a [`CounterStore`]; [`MemoryStore`] is the
//! process-local implementation. A shared backend (Redis, memcached) would
//! implement the same trait, mapping the two increment operations onto its
//! own atomic primitives.

use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::time::Instant;

use crate::error::GuardResult;
use crate::settings::WindowMode;

/// Result of a compare-and-increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterOutcome {
    /// The counter was below the limit and now holds this value.
    Allowed(u64),
    /// The counter was already at or above the limit; it was left untouched.
    Limited(u64),
}

/// Integer counters with per-key time-to-live.
///
/// Both increment operations must be atomic with respect to concurrent
/// callers on the same key.
pub trait CounterStore: Send + Sync {
    /// Current value of `key`, or `None` if absent or expired.
    fn get(&self, key: &str) -> GuardResult<Option<u64>>;

    /// Overwrites `key` with `value`, expiring `ttl` from now.
    fn set(&self, key: &str, value: u64, ttl: Duration) -> GuardResult<()>;

    /// Adds one to `key` and returns the new value.
    ///
    /// An absent or expired key starts at 1 with a fresh `ttl`. A live key
    /// has its TTL reset only when `mode` renews.
    fn increment(&self, key: &str, ttl: Duration, mode: WindowMode) -> GuardResult<u64>;

    /// Adds one to `key` only if its current value is below `limit`.
    ///
    /// TTL handling matches [`increment`](Self::increment). A limited key is
    /// not modified.
    fn increment_if_below(
        &self,
        key: &str,
        limit: u64,
        ttl: Duration,
        mode: WindowMode,
    ) -> GuardResult<CounterOutcome>;

    /// Drops expired entries and returns how many were removed.
    fn purge_expired(&self) -> usize;
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u64,
    expires_at: Instant,
}

impl Counter {
    fn fresh(now: Instant, ttl: Duration) -> Self {
        Self {
            count: 1,
            expires_at: now + ttl,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }

    fn bump(&mut self, now: Instant, ttl: Duration, mode: WindowMode) {
        self.count += 1;
        if mode.renews() {
            self.expires_at = now + ttl;
        }
    }
}

/// In-process [`CounterStore`] backed by a sharded concurrent map.
///
/// Expired entries are evicted lazily when touched and in bulk by
/// [`purge_expired`](CounterStore::purge_expired).
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, Counter>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CounterStore for MemoryStore {
    fn get(&self, key: &str) -> GuardResult<Option<u64>> {
        let now = Instant::now();
        if let Some(counter) = self.entries.get(key) {
            if counter.is_live(now) {
                return Ok(Some(counter.count));
            }
        }
        self.entries.remove_if(key, |_, c| !c.is_live(now));
        Ok(None)
    }

    fn set(&self, key: &str, value: u64, ttl: Duration) -> GuardResult<()> {
        self.entries.insert(
            key.to_owned(),
            Counter {
                count: value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    fn increment(&self, key: &str, ttl: Duration, mode: WindowMode) -> GuardResult<u64> {
        let now = Instant::now();
        match self.entries.entry(key.to_owned()) {
            Entry::Occupied(mut occ) => {
                let counter = occ.get_mut();
                if counter.is_live(now) {
                    counter.bump(now, ttl, mode);
                } else {
                    *counter = Counter::fresh(now, ttl);
                }
                Ok(counter.count)
            }
            Entry::Vacant(vac) => {
                vac.insert(Counter::fresh(now, ttl));
                Ok(1)
            }
        }
    }

    fn increment_if_below(
        &self,
        key: &str,
        limit: u64,
        ttl: Duration,
        mode: WindowMode,
    ) -> GuardResult<CounterOutcome> {
        let now = Instant::now();
        match self.entries.entry(key.to_owned()) {
            Entry::Occupied(mut occ) => {
                let counter = occ.get_mut();
                if counter.is_live(now) {
                    if counter.count >= limit {
                        return Ok(CounterOutcome::Limited(counter.count));
                    }
                    counter.bump(now, ttl, mode);
                    Ok(CounterOutcome::Allowed(counter.count))
                } else if limit == 0 {
                    occ.remove();
                    Ok(CounterOutcome::Limited(0))
                } else {
                    *counter = Counter::fresh(now, ttl);
                    Ok(CounterOutcome::Allowed(1))
                }
            }
            Entry::Vacant(vac) => {
                if limit == 0 {
                    return Ok(CounterOutcome::Limited(0));
                }
                vac.insert(Counter::fresh(now, ttl));
                Ok(CounterOutcome::Allowed(1))
            }
        }
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, c| c.is_live(now));
        before.saturating_sub(self.entries.len())
    }
}
