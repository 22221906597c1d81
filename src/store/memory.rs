use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use super::CounterStore;
use crate::error::{Error, Result};

/// Increments between sweeps of expired entries.
const DEFAULT_SWEEP_INTERVAL: u64 = 1024;

/// In-process counter store with the same expiry semantics as Redis.
///
/// Clones share state, so several limiters built on clones of one store see
/// a single set of counters. It does not coordinate across processes.
///
/// Expired keys are reclaimed on their next increment, and every
/// `sweep_interval` increments the whole map is swept so identifiers that
/// stop calling do not accumulate.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    sweep_interval: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    increments_since_sweep: u64,
}

#[derive(Debug, Clone)]
struct Entry {
    count: i64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

impl Inner {
    fn sweep(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        self.increments_since_sweep = 0;
        before - self.entries.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_sweep_interval(DEFAULT_SWEEP_INTERVAL)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sweep expired entries every `increments` increments (at least 1).
    pub fn with_sweep_interval(increments: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            sweep_interval: increments.max(1),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| Error::StoreUnavailable("Failed to acquire memory store lock".into()))
    }

    /// Drop entries whose expiry has passed. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize> {
        let now = Instant::now();
        Ok(self.lock()?.sweep(now))
    }

    /// Number of live keys.
    pub fn len(&self) -> Result<usize> {
        let now = Instant::now();
        let inner = self.lock()?;
        Ok(inner.entries.values().filter(|entry| !entry.is_expired(now)).count())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Keys held in memory, including expired ones not yet reclaimed.
    pub fn stored_keys(&self) -> Result<usize> {
        Ok(self.lock()?.entries.len())
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn incr_with_expiry(&self, key: &str, period: Duration) -> Result<i64> {
        let now = Instant::now();
        let expires_at = now.checked_add(period).ok_or_else(|| {
            Error::Configuration(format!("period {:?} is too long", period))
        })?;
        let mut inner = self.lock()?;

        inner.increments_since_sweep += 1;
        if inner.increments_since_sweep >= self.sweep_interval {
            inner.sweep(now);
        } else if inner.entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            inner.entries.remove(key);
        }

        let entry = inner.entries.entry(key.to_string()).or_insert(Entry {
            count: 0,
            expires_at: None,
        });
        entry.count += 1;
        if entry.expires_at.is_none() {
            entry.expires_at = Some(expires_at);
        }

        Ok(entry.count)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let now = Instant::now();
        let inner = self.lock()?;

        Ok(inner
            .entries
            .get(key)
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now))
            .filter(|remaining| !remaining.is_zero()))
    }

    async fn get(&self, key: &str) -> Result<Option<i64>> {
        let now = Instant::now();
        let inner = self.lock()?;

        Ok(inner
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.count))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        let mut inner = self.lock()?;

        Ok(inner
            .entries
            .remove(key)
            .is_some_and(|entry| !entry.is_expired(now)))
    }

    async fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }
}
