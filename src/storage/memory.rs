// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::glob_match;
use super::traits::{BackingStore, StoreError};

/// Writes between two sweeps of expired entries.
const SWEEP_INTERVAL: u64 = 256;

#[derive(Debug, Clone)]
struct Entry<T> {
    value: T,
    expires_at: Option<Instant>,
}

impl<T> Entry<T> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process [`BackingStore`] with lazy TTL expiry.
///
/// Expired entries are dropped when read, on every scan, and in a sweep
/// every few hundred writes, so abandoned keys don't pile up.
/// Expiry uses `tokio::time::Instant`, so tests running on a paused clock
/// can fast-forward past TTLs. Entries are namespaced like [`RedisStore`]
/// keys, which lets several layers share one map.
///
/// [`RedisStore`]: super::redis::RedisStore
pub struct InMemoryStore {
    prefix: String,
    values: DashMap<String, Entry<Vec<u8>>>,
    sets: DashMap<String, Entry<HashSet<String>>>,
    closed: AtomicBool,
    writes: AtomicU64,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_prefix("")
    }

    #[must_use]
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            values: DashMap::new(),
            sets: DashMap::new(),
            closed: AtomicBool::new(false),
            writes: AtomicU64::new(0),
        }
    }

    /// Number of live (unexpired) values, excluding sets.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.values.iter().filter(|e| !e.is_expired(now)).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` is present and unexpired (by logical, un-prefixed key).
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        self.values
            .get(&self.prefixed_key(key))
            .is_some_and(|e| !e.is_expired(now))
    }

    /// Raw stored bytes, bypassing expiry checks.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.values.get(&self.prefixed_key(key)).map(|e| e.value.clone())
    }

    /// Remaining TTL of a value.
    #[must_use]
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let entry = self.values.get(&self.prefixed_key(key))?;
        entry.expires_at.map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Remaining TTL of a set.
    #[must_use]
    pub fn set_ttl(&self, set_key: &str) -> Option<Duration> {
        let entry = self.sets.get(&self.prefixed_key(set_key))?;
        entry.expires_at.map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Drop every expired value and set. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.values.len() + self.sets.len();
        self.values.retain(|_, e| !e.is_expired(now));
        self.sets.retain(|_, e| !e.is_expired(now));
        before.saturating_sub(self.values.len() + self.sets.len())
    }

    /// Count a write, sweeping on every [`SWEEP_INTERVAL`]th one.
    fn note_write(&self) {
        let count = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if count % SWEEP_INTERVAL == 0 {
            self.purge_expired();
        }
    }

    pub fn clear(&self) {
        self.values.clear();
        self.sets.clear();
    }

    #[inline]
    fn prefixed_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn expiry(ttl_secs: u64) -> Option<Instant> {
        Some(Instant::now() + Duration::from_secs(ttl_secs))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackingStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.check_open()?;
        let key = self.prefixed_key(key);
        let now = Instant::now();

        // Lazy expiry, like Redis on access
        self.values.remove_if(&key, |_, e| e.is_expired(now));
        Ok(self.values.get(&key).map(|e| e.value.clone()))
    }

    async fn set_with_expiry(&self, key: &str, ttl_secs: u64, value: &[u8]) -> Result<(), StoreError> {
        self.check_open()?;
        self.note_write();
        self.values.insert(
            self.prefixed_key(key),
            Entry { value: value.to_vec(), expires_at: Self::expiry(ttl_secs) },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<u64, StoreError> {
        self.check_open()?;
        let key = self.prefixed_key(key);
        let now = Instant::now();

        let removed = match self.values.remove(&key) {
            Some((_, entry)) => u64::from(!entry.is_expired(now)),
            None => match self.sets.remove(&key) {
                Some((_, entry)) => u64::from(!entry.is_expired(now)),
                None => 0,
            },
        };
        Ok(removed)
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        self.check_open()?;
        self.purge_expired();
        let now = Instant::now();
        let pattern = self.prefixed_key(pattern);

        let values = self.values.iter().filter(|e| !e.is_expired(now)).map(|e| e.key().clone());
        let sets = self.sets.iter().filter(|e| !e.is_expired(now)).map(|e| e.key().clone());

        Ok(values
            .chain(sets)
            .filter(|key| glob_match(&pattern, key))
            .map(|key| key[self.prefix.len()..].to_string())
            .collect())
    }

    async fn add_to_set(&self, set_key: &str, member: &str) -> Result<(), StoreError> {
        self.check_open()?;
        self.note_write();
        let now = Instant::now();
        let mut entry = self
            .sets
            .entry(self.prefixed_key(set_key))
            .or_insert_with(|| Entry { value: HashSet::new(), expires_at: None });
        if entry.is_expired(now) {
            entry.value.clear();
            entry.expires_at = None;
        }
        entry.value.insert(member.to_string());
        Ok(())
    }

    async fn set_members(&self, set_key: &str) -> Result<Vec<String>, StoreError> {
        self.check_open()?;
        let now = Instant::now();
        Ok(self
            .sets
            .get(&self.prefixed_key(set_key))
            .filter(|e| !e.is_expired(now))
            .map(|e| e.value.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn expire_set(&self, set_key: &str, ttl_secs: u64) -> Result<(), StoreError> {
        self.check_open()?;
        if let Some(mut entry) = self.sets.get_mut(&self.prefixed_key(set_key)) {
            entry.expires_at = Self::expiry(ttl_secs);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<String, StoreError> {
        self.check_open()?;
        Ok("PONG".to_string())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_active(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }
}
