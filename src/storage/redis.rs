// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Redis backing store.
//!
//! One [`RedisStore`] per layer. Each store owns a key prefix (`l1:`, `l2:`,
//! ...) so layers can share a physical Redis without colliding:
//!
//! ```text
//! l1:user:42          → JSON bytes (SETEX)
//! l3:course:list      → zstd-compressed JSON bytes (SETEX)
//! l1:tag:users        → SET of un-prefixed keys, 24h EXPIRE
//! ```
//!
//! Every command goes through [`retry`] with the [`RetryConfig::command`]
//! preset; what remains after retries is returned as a [`StoreError`].

use async_trait::async_trait;
use parking_lot::RwLock;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{cmd, AsyncCommands, Client};

use super::traits::{BackingStore, StoreError};
use crate::resilience::retry::{retry, RetryConfig};

/// Keys fetched per SCAN round trip.
const SCAN_BATCH: usize = 500;

/// Retries the connection manager makes on its own, per connect attempt.
const MANAGER_RETRIES: usize = 1;

pub struct RedisStore {
    /// `None` once closed
    connection: RwLock<Option<ConnectionManager>>,
    /// Key prefix for namespacing (e.g., "l1:" → "l1:user.alice")
    prefix: String,
    retry_config: RetryConfig,
}

impl RedisStore {
    /// Create a new Redis store without a key prefix.
    pub async fn new(connection_string: &str) -> Result<Self, StoreError> {
        Self::with_prefix(connection_string, "", &RetryConfig::connect()).await
    }

    /// Connect with a key prefix.
    ///
    /// Connection attempts follow `connect_retry`; a store that can't be
    /// reached within it is a configuration problem, not a transient one.
    ///
    /// ```rust,no_run
    /// # use tiered_cache::storage::redis::RedisStore;
    /// # use tiered_cache::RetryConfig;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// // Keys will be prefixed: "l2:course:list", "l2:tag:courses"
    /// let store = RedisStore::with_prefix("redis://localhost", "l2:", &RetryConfig::connect()).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn with_prefix(
        connection_string: &str,
        prefix: &str,
        connect_retry: &RetryConfig,
    ) -> Result<Self, StoreError> {
        let client = Client::open(connection_string)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        // Backoff comes from `connect_retry`; the manager adds one retry of its own.
        let manager_config =
            ConnectionManagerConfig::new().set_number_of_retries(MANAGER_RETRIES);
        let connection = retry("redis_connect", connect_retry, || async {
            ConnectionManager::new_with_config(client.clone(), manager_config.clone()).await
        })
        .await
        .map_err(|e: redis::RedisError| StoreError::Backend(e.to_string()))?;

        Ok(Self {
            connection: RwLock::new(Some(connection)),
            prefix: prefix.to_string(),
            retry_config: RetryConfig::command(),
        })
    }

    /// Apply the prefix to a key.
    #[inline]
    fn prefixed_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Strip the prefix from a scanned key.
    #[inline]
    fn strip_prefix<'a>(&self, key: &'a str) -> &'a str {
        key.strip_prefix(self.prefix.as_str()).unwrap_or(key)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn connection(&self) -> Result<ConnectionManager, StoreError> {
        self.connection.read().clone().ok_or(StoreError::Closed)
    }

    /// Run one command with retries against a fresh handle of the shared
    /// connection.
    async fn run<T, F, Fut>(&self, operation: &str, command: F) -> Result<T, StoreError>
    where
        F: Fn(ConnectionManager) -> Fut,
        Fut: std::future::Future<Output = redis::RedisResult<T>>,
    {
        let conn = self.connection()?;
        retry(operation, &self.retry_config, || command(conn.clone()))
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[async_trait]
impl BackingStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let key = self.prefixed_key(key);
        self.run("redis_get", |mut conn| {
            let key = key.clone();
            async move { conn.get(&key).await }
        })
        .await
    }

    async fn set_with_expiry(&self, key: &str, ttl_secs: u64, value: &[u8]) -> Result<(), StoreError> {
        let key = self.prefixed_key(key);
        self.run("redis_setex", |mut conn| {
            let key = key.clone();
            async move {
                cmd("SETEX")
                    .arg(&key)
                    .arg(ttl_secs)
                    .arg(value)
                    .query_async(&mut conn)
                    .await
            }
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<u64, StoreError> {
        let key = self.prefixed_key(key);
        self.run("redis_del", |mut conn| {
            let key = key.clone();
            async move { conn.del(&key).await }
        })
        .await
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let pattern = self.prefixed_key(pattern);
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        // Cursor-based SCAN; never KEYS, which blocks the server
        loop {
            let (next, batch): (u64, Vec<String>) = self
                .run("redis_scan", |mut conn| {
                    let pattern = pattern.clone();
                    async move {
                        cmd("SCAN")
                            .arg(cursor)
                            .arg("MATCH")
                            .arg(&pattern)
                            .arg("COUNT")
                            .arg(SCAN_BATCH)
                            .query_async(&mut conn)
                            .await
                    }
                })
                .await?;

            keys.extend(batch.iter().map(|k| self.strip_prefix(k).to_string()));
            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(keys)
    }

    async fn add_to_set(&self, set_key: &str, member: &str) -> Result<(), StoreError> {
        let set_key = self.prefixed_key(set_key);
        self.run("redis_sadd", |mut conn| {
            let set_key = set_key.clone();
            async move { conn.sadd(&set_key, member).await }
        })
        .await
    }

    async fn set_members(&self, set_key: &str) -> Result<Vec<String>, StoreError> {
        let set_key = self.prefixed_key(set_key);
        self.run("redis_smembers", |mut conn| {
            let set_key = set_key.clone();
            async move { conn.smembers(&set_key).await }
        })
        .await
    }

    async fn expire_set(&self, set_key: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let set_key = self.prefixed_key(set_key);
        self.run("redis_expire", |mut conn| {
            let set_key = set_key.clone();
            async move {
                cmd("EXPIRE")
                    .arg(&set_key)
                    .arg(ttl_secs)
                    .query_async(&mut conn)
                    .await
            }
        })
        .await
    }

    async fn ping(&self) -> Result<String, StoreError> {
        // Single attempt: health checks report the current state
        let mut conn = self.connection()?;
        let pong: String = cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(pong)
    }

    async fn close(&self) -> Result<(), StoreError> {
        // ConnectionManager closes its socket once the last handle drops
        match self.connection.write().take() {
            Some(_) => Ok(()),
            None => Err(StoreError::Closed),
        }
    }

    fn is_active(&self) -> bool {
        self.connection.read().is_some()
    }
}
