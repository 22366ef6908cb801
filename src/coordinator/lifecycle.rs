// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Engine lifecycle: connect, warm up, shut down.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::layer::Layer;
use crate::resilience::retry::RetryConfig;
use crate::storage::redis::RedisStore;
use crate::storage::traits::BackingStore;

use super::types::WarmOutcome;
use super::{CacheError, EngineState, TieredCache, WarmEntry, WarmupReport};

impl TieredCache {
    /// Connect one Redis store per layer.
    ///
    /// Each layer uses its own connection settings when configured, else the
    /// shared ones, and namespaces its keys with `<layer>:`. Connection
    /// attempts retry with backoff up to the configured count; a layer that
    /// stays unreachable fails startup and leaves the engine unbound.
    #[tracing::instrument(skip(self))]
    pub async fn start(&mut self) -> Result<(), CacheError> {
        let startup_start = std::time::Instant::now();
        info!("Starting tiered cache...");
        self.set_state(EngineState::Connecting);

        let mut stores: [Option<Arc<dyn BackingStore>>; 4] = Default::default();
        for layer in Layer::ALL {
            match self.connect_layer(layer).await {
                Ok(store) => stores[layer.index()] = Some(store),
                Err(e) => {
                    error!(layer = %layer, error = %e, "Failed to connect layer");
                    crate::metrics::set_layer_healthy(layer, false);
                    self.set_state(EngineState::Created);
                    return Err(e);
                }
            }
        }

        self.stores = stores;
        self.set_state(EngineState::Ready);
        info!(elapsed_ms = startup_start.elapsed().as_millis() as u64, "Tiered cache ready");
        Ok(())
    }

    async fn connect_layer(&self, layer: Layer) -> Result<Arc<dyn BackingStore>, CacheError> {
        let connection = self.config.connection(layer);
        let retry = RetryConfig::connect().with_max_attempts(connection.retries);
        info!(layer = %layer, host = %connection.host, port = connection.port, "Connecting layer store");

        let store = RedisStore::with_prefix(&connection.url(), &layer.namespace(), &retry)
            .await
            .map_err(|source| CacheError::Connect { layer, source })?;

        crate::metrics::set_layer_healthy(layer, true);
        Ok(Arc::new(store))
    }

    /// [`start`](Self::start), then [`warm_cache`](Self::warm_cache).
    pub async fn start_with_warmup(
        &mut self,
        entries: Vec<WarmEntry>,
    ) -> Result<WarmupReport, CacheError> {
        self.start().await?;

        self.set_state(EngineState::WarmingUp);
        let report = self.warm_cache(entries).await;
        self.set_state(EngineState::Ready);
        report
    }

    /// Fill the cache ahead of traffic.
    ///
    /// Entries run concurrently. An entry whose key is already cached is
    /// skipped without calling its fetcher; a failing fetcher is logged and
    /// the rest carry on.
    ///
    /// ```rust,no_run
    /// # use tiered_cache::{TieredCache, WarmEntry, SetOptions, FetchError};
    /// # use serde_json::json;
    /// # async fn example(cache: &TieredCache) -> Result<(), tiered_cache::CacheError> {
    /// let entries = vec![WarmEntry::new("site:config", SetOptions::default(), || async {
    ///     Ok::<_, FetchError>(json!({"theme": "dark"}))
    /// })];
    /// let report = cache.warm_cache(entries).await?;
    /// println!("warmed {}", report.warmed);
    /// # Ok(())
    /// # }
    /// ```
    #[tracing::instrument(skip(self, entries), fields(entries = entries.len()))]
    pub async fn warm_cache(&self, entries: Vec<WarmEntry>) -> Result<WarmupReport, CacheError> {
        // Surface wiring problems once instead of per entry
        for layer in Layer::ALL {
            self.store(layer)?;
        }

        let outcomes = join_all(entries.into_iter().map(|entry| self.warm_entry(entry))).await;
        let report = WarmupReport::tally(outcomes);

        info!(
            warmed = report.warmed,
            skipped = report.skipped,
            failed = report.failed,
            "Cache warm-up complete"
        );
        Ok(report)
    }

    async fn warm_entry(&self, entry: WarmEntry) -> WarmOutcome {
        let WarmEntry { key, fetcher, options } = entry;

        match self.get(&key, options.lookup()).await {
            Ok(Some(_)) => {
                debug!(key = %key, "Already cached, skipping warm-up");
                return WarmOutcome::Skipped;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(key = %key, error = %e, "Warm-up lookup failed");
                return WarmOutcome::Failed;
            }
        }

        let value = match fetcher().await {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "Warm-up fetcher failed");
                return WarmOutcome::Failed;
            }
        };

        match self.store_value(&key, &value, options).await {
            Ok(true) => WarmOutcome::Warmed,
            Ok(false) => {
                warn!(key = %key, "Warm-up write was dropped");
                WarmOutcome::Failed
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Warm-up write failed");
                WarmOutcome::Failed
            }
        }
    }

    /// Close every open store.
    ///
    /// Close failures are logged and don't stop the remaining layers. Calls
    /// made after shutdown degrade to misses and no-ops.
    pub async fn shutdown(&self) {
        let shutdown_start = std::time::Instant::now();
        info!("Initiating tiered cache shutdown...");
        self.set_state(EngineState::ShuttingDown);

        for layer in Layer::ALL {
            let Some(store) = &self.stores[layer.index()] else {
                continue;
            };
            if !store.is_active() {
                continue;
            }
            match store.close().await {
                Ok(()) => debug!(layer = %layer, "Closed layer store"),
                Err(e) => {
                    warn!(layer = %layer, error = %e, "Failed to close layer store");
                    crate::metrics::record_error(layer, "close");
                }
            }
        }

        self.set_state(EngineState::Stopped);
        info!(elapsed_ms = shutdown_start.elapsed().as_millis() as u64, "Tiered cache shutdown complete");
    }
}
