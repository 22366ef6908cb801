// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Statistics, admin key scan, health probes and layer flushing.

use std::collections::BTreeMap;

use futures::future::join_all;
use tracing::{info, warn};

use crate::layer::Layer;
use crate::metrics;
use crate::stats::{AdminStatsSnapshot, LayerKeyReport, StatsSnapshot};

use super::tags::TAG_PREFIX;
use super::{degrade, CacheError, TieredCache};

impl TieredCache {
    /// Hot-path counters with per-layer size estimates. No I/O.
    #[must_use]
    pub fn get_statistics(&self) -> StatsSnapshot {
        self.stats.snapshot(&self.registry)
    }

    /// Scan every layer and count its keys.
    ///
    /// Tag records are counted apart from cache entries. A layer whose scan
    /// fails is reported with zero keys and the error text; the other layers
    /// are unaffected.
    ///
    /// # Performance
    ///
    /// Walks every key in every layer. Meant for admin endpoints, not
    /// request paths.
    #[tracing::instrument(skip(self))]
    pub async fn get_cache_stats(&self) -> Result<AdminStatsSnapshot, CacheError> {
        let mut layers = Vec::with_capacity(Layer::ALL.len());
        let mut total_keys = 0;

        for definition in self.registry.iter() {
            let layer = definition.layer;
            let store = self.store(layer)?;

            let report = match store.scan_keys("*").await {
                Ok(keys) => {
                    let tag_records = keys.iter().filter(|k| k.starts_with(TAG_PREFIX)).count() as u64;
                    let entries = keys.len() as u64 - tag_records;
                    metrics::set_layer_keys(layer, entries as usize);
                    total_keys += entries;
                    LayerKeyReport {
                        layer,
                        keys: entries,
                        tag_records,
                        max_keys: definition.max_keys,
                        utilization: utilization(entries, definition.max_keys),
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(layer = %layer, error = %e, "Key scan failed");
                    metrics::record_error(layer, "scan");
                    LayerKeyReport {
                        layer,
                        keys: 0,
                        tag_records: 0,
                        max_keys: definition.max_keys,
                        utilization: 0.0,
                        error: Some(e.to_string()),
                    }
                }
            };
            layers.push(report);
        }

        Ok(AdminStatsSnapshot { layers, total_keys })
    }

    /// Ping every layer concurrently.
    ///
    /// A layer is healthy when its store answers `PONG`; errors and other
    /// replies are unhealthy. Never fails because of a store.
    #[tracing::instrument(skip(self))]
    pub async fn health_check(&self) -> Result<BTreeMap<Layer, bool>, CacheError> {
        let stores = Layer::ALL
            .into_iter()
            .map(|layer| self.store(layer).map(|store| (layer, store)))
            .collect::<Result<Vec<_>, _>>()?;

        let results = join_all(stores.into_iter().map(|(layer, store)| async move {
            let healthy = match store.ping().await {
                Ok(reply) => reply == "PONG",
                Err(e) => {
                    warn!(layer = %layer, error = %e, "Health probe failed");
                    false
                }
            };
            metrics::set_layer_healthy(layer, healthy);
            (layer, healthy)
        }))
        .await;

        Ok(results.into_iter().collect())
    }

    /// Delete every key in one layer, tag records included.
    ///
    /// Returns the number of cache entries removed, which also count as
    /// evictions. A failing scan removes nothing.
    #[tracing::instrument(skip(self))]
    pub async fn flush_layer(&self, layer: Layer) -> Result<u64, CacheError> {
        let store = self.store(layer)?;
        let Some(keys) = degrade(layer, "scan", "*", store.scan_keys("*")).await else {
            return Ok(0);
        };

        let mut removed = 0;
        for key in &keys {
            let deleted = degrade(layer, "delete", key, store.delete(key)).await.unwrap_or(0);
            if !key.starts_with(TAG_PREFIX) {
                removed += deleted;
            }
        }

        if removed > 0 {
            self.stats.record_evictions(removed);
            metrics::record_evictions(layer, removed);
        }
        info!(layer = %layer, scanned = keys.len(), removed, "Flushed layer");
        Ok(removed)
    }
}

fn utilization(keys: u64, max_keys: u64) -> f64 {
    if max_keys == 0 {
        0.0
    } else {
        keys as f64 / max_keys as f64
    }
}
