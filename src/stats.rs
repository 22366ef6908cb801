// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-process hit/miss counters.
//!
//! Counters are relaxed atomics: under concurrency a snapshot may be a few
//! increments behind, which is fine for dashboards and nothing relies on
//! them for correctness. They only grow, and reset with the process.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::layer::{Layer, LayerRegistry};

#[derive(Debug, Default)]
struct LayerCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
}

/// Owner of every engine counter.
#[derive(Debug, Default)]
pub struct StatsAggregator {
    hits: AtomicU64,
    misses: AtomicU64,
    operations: AtomicU64,
    evictions: AtomicU64,
    layers: [LayerCounters; 4],
}

impl StatsAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self, layer: Layer) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.operations.fetch_add(1, Ordering::Relaxed);
        self.layers[layer.index()].hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self, layer: Layer) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.operations.fetch_add(1, Ordering::Relaxed);
        self.layers[layer.index()].misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_set(&self, layer: Layer) {
        self.operations.fetch_add(1, Ordering::Relaxed);
        self.layers[layer.index()].sets.fetch_add(1, Ordering::Relaxed);
    }

    /// Any other store-touching operation (delete, ...).
    pub fn record_operation(&self) {
        self.operations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    /// Point-in-time copy with synthetic size estimates.
    #[must_use]
    pub fn snapshot(&self, registry: &LayerRegistry) -> StatsSnapshot {
        let layers: Vec<LayerStatsSnapshot> = registry
            .iter()
            .map(|def| {
                let counters = &self.layers[def.layer.index()];
                let hits = counters.hits.load(Ordering::Relaxed);
                let misses = counters.misses.load(Ordering::Relaxed);
                LayerStatsSnapshot {
                    layer: def.layer,
                    hits,
                    misses,
                    sets: counters.sets.load(Ordering::Relaxed),
                    size: (hits + misses).saturating_mul(def.weight),
                }
            })
            .collect();

        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            operations: self.operations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            total_size: layers.iter().map(|l| l.size).sum(),
            layers,
        }
    }
}

/// Hot-path statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub operations: u64,
    pub evictions: u64,
    /// Sum of the per-layer estimates
    pub total_size: u64,
    /// In cascade order
    pub layers: Vec<LayerStatsSnapshot>,
}

impl StatsSnapshot {
    /// hits / (hits + misses), 0.0 before any lookup.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    #[must_use]
    pub fn layer(&self, layer: Layer) -> Option<&LayerStatsSnapshot> {
        self.layers.iter().find(|l| l.layer == layer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerStatsSnapshot {
    pub layer: Layer,
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    /// `(hits + misses) * weight`. An activity estimate, not a key count.
    pub size: u64,
}

/// Result of the admin key scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminStatsSnapshot {
    pub layers: Vec<LayerKeyReport>,
    /// Entries across all layers that scanned successfully
    pub total_keys: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerKeyReport {
    pub layer: Layer,
    /// Cache entries (excluding tag records)
    pub keys: u64,
    pub tag_records: u64,
    pub max_keys: u64,
    /// keys / max_keys
    pub utilization: f64,
    /// Set when the scan failed; counts are zero then
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TieredCacheConfig;

    fn registry() -> LayerRegistry {
        LayerRegistry::from_config(&TieredCacheConfig::default())
    }

    #[test]
    fn test_empty_snapshot() {
        let stats = StatsAggregator::new().snapshot(&registry());
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.total_size, 0);
        assert_eq!(stats.layers.len(), 4);
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hits_and_misses_update_global_and_layer() {
        let stats = StatsAggregator::new();
        stats.record_hit(Layer::L1);
        stats.record_hit(Layer::L1);
        stats.record_miss(Layer::L2);
        stats.record_set(Layer::L2);
        stats.record_operation();

        let snap = stats.snapshot(&registry());
        assert_eq!(snap.hits, 2);
        assert_eq!(snap.misses, 1);
        assert_eq!(snap.operations, 5);
        assert_eq!(snap.layer(Layer::L1).unwrap().hits, 2);
        assert_eq!(snap.layer(Layer::L2).unwrap().misses, 1);
        assert_eq!(snap.layer(Layer::L2).unwrap().sets, 1);
        assert!((snap.hit_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_size_estimate_uses_layer_weight() {
        let stats = StatsAggregator::new();
        stats.record_hit(Layer::L1);
        stats.record_miss(Layer::L3);
        stats.record_hit(Layer::L4);
        stats.record_miss(Layer::L4);

        let snap = stats.snapshot(&registry());
        assert_eq!(snap.layer(Layer::L1).unwrap().size, 1);
        assert_eq!(snap.layer(Layer::L3).unwrap().size, 4);
        assert_eq!(snap.layer(Layer::L4).unwrap().size, 16);
        assert_eq!(snap.total_size, 21);
    }

    #[test]
    fn test_evictions() {
        let stats = StatsAggregator::new();
        stats.record_evictions(3);
        stats.record_evictions(2);
        assert_eq!(stats.snapshot(&registry()).evictions, 5);
    }

    #[test]
    fn test_snapshot_serializes() {
        let stats = StatsAggregator::new();
        stats.record_hit(Layer::L2);
        let json = serde_json::to_value(stats.snapshot(&registry())).unwrap();
        assert_eq!(json["hits"], 1);
        assert_eq!(json["layers"][1]["layer"], "l2");
    }
}
