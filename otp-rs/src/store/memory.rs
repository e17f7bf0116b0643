//! In-memory store
//!
//! Values and counters live in separate maps behind a single `RwLock`, so
//! every trait operation is atomic. Expired entries are treated as absent on
//! read. Writes sweep them out once every cleanup interval, and
//! [`MemoryStore::purge_expired`] forces a sweep.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use super::Store;
use crate::clock::{expiry_after, Clock, SystemClock};
use crate::error::Result;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u64,
    expires_at: DateTime<Utc>,
}

/// Default time between opportunistic sweeps
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

struct State {
    values: HashMap<String, Entry>,
    counters: HashMap<String, Counter>,
    last_cleanup: DateTime<Utc>,
}

impl State {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            values: HashMap::new(),
            counters: HashMap::new(),
            last_cleanup: now,
        }
    }

    fn purge(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.values.len() + self.counters.len();
        self.values.retain(|_, e| e.expires_at > now);
        self.counters.retain(|_, c| c.expires_at > now);
        self.last_cleanup = now;
        before - (self.values.len() + self.counters.len())
    }

    /// Sweep if the last sweep is older than `interval`
    fn maybe_purge(&mut self, now: DateTime<Utc>, interval: Duration) {
        if now < expiry_after(self.last_cleanup, interval) {
            return;
        }

        let removed = self.purge(now);
        debug!("Memory store cleanup removed {} expired entries", removed);
    }
}

/// Process-local [`Store`] implementation
pub struct MemoryStore {
    state: RwLock<State>,
    clock: Arc<dyn Clock>,
    cleanup_interval: Duration,
}

impl MemoryStore {
    /// Create a store that expires entries against the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a store that expires entries against `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(State::new(clock.now())),
            clock,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }

    /// Change how often writes sweep out expired entries
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Drop every expired value and counter, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let removed = self.state.write().await.purge(now);
        debug!("Purged {} expired entries", removed);
        removed
    }

    /// Number of entries currently held, expired or not
    pub async fn len(&self) -> usize {
        let state = self.state.read().await;
        state.values.len() + state.counters.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn put(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        state.maybe_purge(now, self.cleanup_interval);
        state.values.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at: expiry_after(now, ttl),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = self.clock.now();
        let state = self.state.read().await;
        Ok(state
            .values
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.values.remove(key);
        state.counters.remove(key);
        Ok(())
    }

    async fn get_and_delete(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        Ok(state
            .values
            .remove(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.value))
    }

    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> Result<bool> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        let matches = state
            .values
            .get(key)
            .is_some_and(|e| e.expires_at > now && e.value == expected);

        if matches {
            state.values.remove(key);
        }
        Ok(matches)
    }

    async fn increment(&self, key: &str, ttl: Duration) -> Result<u64> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        state.maybe_purge(now, self.cleanup_interval);

        let counter = state
            .counters
            .entry(key.to_string())
            .or_insert(Counter {
                count: 0,
                expires_at: expiry_after(now, ttl),
            });

        if counter.expires_at <= now {
            counter.count = 0;
            counter.expires_at = expiry_after(now, ttl);
        }

        counter.count += 1;
        Ok(counter.count)
    }

    async fn count(&self, key: &str) -> Result<u64> {
        let now = self.clock.now();
        let state = self.state.read().await;
        Ok(state
            .counters
            .get(key)
            .filter(|c| c.expires_at > now)
            .map_or(0, |c| c.count))
    }
}
