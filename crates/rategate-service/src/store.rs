//! In-memory counter store: the only shared mutable state in the governor.
//!
//! Entries live in a sharded `DashMap`. An evaluation holds the write lock of
//! the key's shard for the whole read-modify-write, so concurrent attempts on
//! one key are serialized and never lose an increment.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::clock::{Clock, SystemClock};
use crate::error::{ServiceError, ServiceResult};
use crate::window::{self, RateLimitDecision, RateLimitEntry};

/// Default age after which an entry is swept: one hour.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(60 * 60);

/// Default cadence of the expiry sweeper.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Store-wide settings.
#[derive(Debug, Clone, Copy)]
pub struct StoreConfig {
    /// Entries whose window opened longer ago than this are evicted by the
    /// sweeper. Every governor mounted on the store must use a window no
    /// longer than this.
    pub stale_after: Duration,
    /// How often the sweeper runs.
    pub sweep_interval: Duration,
}

impl StoreConfig {
    /// Rejects settings that would stop the sweeper or evict live entries
    /// immediately.
    pub fn validate(&self) -> ServiceResult<()> {
        if self.sweep_interval.is_zero() {
            return Err(ServiceError::InvalidConfig(
                "sweep interval must be longer than zero".to_string(),
            ));
        }
        if self.stale_after.is_zero() {
            return Err(ServiceError::InvalidConfig(
                "stale threshold must be longer than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            stale_after: DEFAULT_STALE_AFTER,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// Process-local store of rate-limit entries, cloneable across handlers.
#[derive(Clone)]
pub struct CounterStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    config: StoreConfig,
    clock: Arc<dyn Clock>,
    entries: DashMap<String, RateLimitEntry>,
}

impl CounterStore {
    /// Creates an empty store reading wall-clock time.
    pub fn new(config: StoreConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates an empty store with an injected time source (for tests).
    pub fn with_clock(config: StoreConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                config,
                clock,
                entries: DashMap::new(),
            }),
        }
    }

    pub fn stale_after(&self) -> Duration {
        self.inner.config.stale_after
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// Records one attempt for `key` and decides whether it is allowed.
    ///
    /// Creates the entry on first sight, replaces it once its window has
    /// fully elapsed, and increments it in place otherwise.
    pub fn evaluate(&self, key: &str, cap: u32, window: Duration) -> RateLimitDecision {
        let now = self.now();

        match self.inner.entries.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => window::advance(occupied.get_mut(), now, cap, window),
            Entry::Vacant(vacant) => {
                let (entry, decision) = window::open(now, cap, window);
                vacant.insert(entry);
                decision
            }
        }
    }

    /// Returns a copy of the entry for `key`, if any.
    pub fn get(&self, key: &str) -> Option<RateLimitEntry> {
        self.inner.entries.get(key).map(|entry| *entry.value())
    }

    /// Forgets `key` entirely. Returns `true` if an entry was removed.
    pub fn reset(&self, key: &str) -> bool {
        self.inner.entries.remove(key).is_some()
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Evicts every entry whose window opened more than `stale_after` ago.
    ///
    /// Stale keys are collected first and removed one at a time, so no lock
    /// is held for longer than one shard scan or one removal. Each removal
    /// re-checks staleness in case the key was reset in between.
    pub fn sweep(&self) -> usize {
        let now = self.now();
        let stale_after = self.inner.config.stale_after;

        let stale: Vec<String> = self
            .inner
            .entries
            .iter()
            .filter(|entry| entry.value().age(now) > stale_after)
            .map(|entry| entry.key().clone())
            .collect();

        stale
            .into_iter()
            .filter(|key| {
                self.inner
                    .entries
                    .remove_if(key, |_, entry| entry.age(now) > stale_after)
                    .is_some()
            })
            .count()
    }
}
