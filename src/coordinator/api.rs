// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Read and write path: cascading get with promotion, set, delete and the
//! cache-aside helper.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use crate::compression;
use crate::layer::Layer;
use crate::metrics::{self, LatencyTimer};

use super::{degrade, CacheError, DeleteOptions, GetOptions, SetOptions, TieredCache};

/// Store TTLs are whole seconds; sub-second remainders are dropped and
/// anything shorter than a second becomes one.
pub(super) fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

impl TieredCache {
    /// Look a key up, starting at its layer and falling through to slower
    /// ones.
    ///
    /// On a hit below the starting layer the value is copied into every
    /// layer that missed, using each layer's default TTL. Store failures
    /// count as misses; an unknown layer name is a miss.
    ///
    /// ```rust,no_run
    /// # use tiered_cache::{TieredCache, GetOptions, Layer};
    /// # async fn example(cache: &TieredCache) -> Result<(), tiered_cache::CacheError> {
    /// // Classified by key: "user:" keys start in l1
    /// let user = cache.get("user:42", GetOptions::default()).await?;
    ///
    /// // Explicit layer
    /// let report = cache.get("daily", GetOptions::in_layer(Layer::L3)).await?;
    /// # Ok(())
    /// # }
    /// ```
    #[tracing::instrument(skip(self, options))]
    pub async fn get(&self, key: &str, options: GetOptions) -> Result<Option<Value>, CacheError> {
        let Some(start) = self.target_layer(key, options.layer.as_ref(), None) else {
            return Ok(None);
        };
        self.read_through(key, start).await
    }

    async fn read_through(&self, key: &str, start: Layer) -> Result<Option<Value>, CacheError> {
        let mut missed: Vec<Layer> = Vec::new();
        let mut next = Some(start);

        while let Some(layer) = next {
            let store = self.store(layer)?;
            let found = {
                let _timer = LatencyTimer::new(layer, "get");
                degrade(layer, "get", key, store.get(key)).await.flatten()
            };

            let Some(bytes) = found else {
                self.stats.record_miss(layer);
                metrics::record_operation(layer, "get", "miss");
                missed.push(layer);
                next = self.registry.next_layer(layer);
                continue;
            };

            self.stats.record_hit(layer);
            metrics::record_operation(layer, "get", "hit");
            debug!(key, layer = %layer, depth = missed.len(), "Cache hit");

            let value = compression::decode(&bytes);
            // Slowest missed layer first
            for &faster in missed.iter().rev() {
                self.promote(key, &value, faster).await?;
            }
            return Ok(Some(value));
        }

        debug!(key, start = %start, "Cache miss in every layer");
        Ok(None)
    }

    async fn promote(&self, key: &str, value: &Value, layer: Layer) -> Result<(), CacheError> {
        let ttl = self.registry.definition(layer).ttl;
        if self.write_value(key, value, layer, ttl).await? {
            metrics::record_promotion(layer);
            debug!(key, layer = %layer, "Promoted value");
        }
        Ok(())
    }

    /// Store a value.
    ///
    /// The layer comes from `options.layer` or the classifier, the TTL from
    /// `options.ttl` or the layer's default. Tags are recorded in the same
    /// layer once the value is written. Store failures and unknown layer
    /// names leave the cache unchanged.
    ///
    /// ```rust,no_run
    /// # use std::time::Duration;
    /// # use tiered_cache::{TieredCache, SetOptions, Layer};
    /// # use serde_json::json;
    /// # async fn example(cache: &TieredCache) -> Result<(), tiered_cache::CacheError> {
    /// let options = SetOptions::in_layer(Layer::L1)
    ///     .with_ttl(Duration::from_secs(10))
    ///     .with_tags(["tasks"]);
    /// cache.set("task:42", &json!({"title": "Ship"}), options).await?;
    /// # Ok(())
    /// # }
    /// ```
    #[tracing::instrument(skip(self, value, options))]
    pub async fn set(&self, key: &str, value: &Value, options: SetOptions) -> Result<(), CacheError> {
        self.store_value(key, value, options).await?;
        Ok(())
    }

    /// [`set`](Self::set), reporting whether the value reached a store.
    pub(super) async fn store_value(
        &self,
        key: &str,
        value: &Value,
        options: SetOptions,
    ) -> Result<bool, CacheError> {
        let Some(layer) = self.target_layer(key, options.layer.as_ref(), Some(value)) else {
            return Ok(false);
        };
        let ttl = options.ttl.unwrap_or(self.registry.definition(layer).ttl);

        let written = self.write_value(key, value, layer, ttl).await?;
        if written && !options.tags.is_empty() {
            self.register_tags(key, &options.tags, layer).await?;
        }
        Ok(written)
    }

    /// Encode and write one value. Returns whether the store accepted it.
    async fn write_value(
        &self,
        key: &str,
        value: &Value,
        layer: Layer,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let store = self.store(layer)?;
        let definition = self.registry.definition(layer);

        let encoded = match compression::encode(value, definition.compression_enabled) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(key, layer = %layer, error = %e, "Failed to encode value, skipping write");
                metrics::record_error(layer, "encode");
                return Ok(false);
            }
        };

        let written = {
            let _timer = LatencyTimer::new(layer, "set");
            degrade(layer, "set", key, store.set_with_expiry(key, ttl_secs(ttl), &encoded.bytes))
                .await
                .is_some()
        };
        if !written {
            metrics::record_operation(layer, "set", "error");
            return Ok(false);
        }

        self.stats.record_set(layer);
        metrics::record_operation(layer, "set", "ok");
        if let Some(stats) = &encoded.stats {
            metrics::record_compression(layer, stats);
            debug!(
                key,
                layer = %layer,
                original = stats.original_bytes,
                compressed = stats.compressed_bytes,
                "Compressed value"
            );
        }
        Ok(true)
    }

    /// Remove a key from one layer (never cascades).
    ///
    /// Returns whether a key was removed.
    #[tracing::instrument(skip(self, options))]
    pub async fn delete(&self, key: &str, options: DeleteOptions) -> Result<bool, CacheError> {
        let Some(layer) = self.target_layer(key, options.layer.as_ref(), None) else {
            return Ok(false);
        };
        let store = self.store(layer)?;

        self.stats.record_operation();
        let removed = degrade(layer, "delete", key, store.delete(key)).await.unwrap_or(0);
        metrics::record_operation(layer, "delete", if removed > 0 { "ok" } else { "miss" });
        Ok(removed > 0)
    }

    /// Get a value, or compute and store it if missing.
    ///
    /// The factory only runs on a miss. Its error is returned as-is and
    /// nothing is stored.
    ///
    /// ```rust,no_run
    /// # use tiered_cache::{TieredCache, SetOptions, FetchError};
    /// # use serde_json::json;
    /// # async fn example(cache: &TieredCache) -> Result<(), FetchError> {
    /// let courses = cache
    ///     .get_or_set_with("course:list", SetOptions::default(), || async {
    ///         // Expensive operation - only runs if not cached
    ///         Ok::<_, FetchError>(json!(["rust", "go"]))
    ///     })
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get_or_set_with<F, Fut, E>(
        &self,
        key: &str,
        options: SetOptions,
        factory: F,
    ) -> Result<Value, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
        E: From<CacheError>,
    {
        if let Some(value) = self.get(key, options.lookup()).await? {
            return Ok(value);
        }

        let value = factory().await?;
        self.set(key, &value, options).await?;
        Ok(value)
    }
}
