// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Store connection is closed")]
    Closed,
}

/// Minimal contract for a TTL-capable key-value service backing one layer.
///
/// Keys are passed un-namespaced; implementations apply their own prefix
/// and strip it again from [`scan_keys`](Self::scan_keys) results.
#[async_trait]
pub trait BackingStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write `value` expiring after `ttl_secs` seconds.
    async fn set_with_expiry(&self, key: &str, ttl_secs: u64, value: &[u8]) -> Result<(), StoreError>;

    /// Returns the number of keys removed (0 or 1).
    async fn delete(&self, key: &str) -> Result<u64, StoreError>;

    /// Glob-style key scan (`*`, `?`). O(keys) - admin use only.
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    async fn add_to_set(&self, set_key: &str, member: &str) -> Result<(), StoreError>;

    async fn set_members(&self, set_key: &str) -> Result<Vec<String>, StoreError>;

    async fn expire_set(&self, set_key: &str, ttl_secs: u64) -> Result<(), StoreError>;

    /// Liveness probe; healthy stores answer `PONG`.
    async fn ping(&self) -> Result<String, StoreError>;

    async fn close(&self) -> Result<(), StoreError>;

    /// Whether the connection is open.
    fn is_active(&self) -> bool;
}
