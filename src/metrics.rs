// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the tiered cache.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application chooses the exporter (Prometheus, OTEL, etc.)
//!
//! These complement [`crate::stats`]: the stats aggregator answers
//! in-process questions ("what's the hit rate?"), metrics feed dashboards.
//!
//! # Metric Naming Convention
//! - `tiered_cache_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `layer`: l1, l2, l3, l4
//! - `operation`: get, set, delete, promote, invalidate, ping, scan, close
//! - `status`: hit, miss, ok, error

use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};

use crate::compression::CompressionStats;
use crate::coordinator::EngineState;
use crate::layer::Layer;

/// Record a cache operation outcome.
pub fn record_operation(layer: Layer, operation: &'static str, status: &'static str) {
    counter!(
        "tiered_cache_operations_total",
        "layer" => layer.name(),
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

/// Record operation latency.
pub fn record_latency(layer: Layer, operation: &'static str, duration: Duration) {
    histogram!(
        "tiered_cache_operation_seconds",
        "layer" => layer.name(),
        "operation" => operation
    )
    .record(duration.as_secs_f64());
}

/// Record a degraded store call.
pub fn record_error(layer: Layer, operation: &'static str) {
    counter!(
        "tiered_cache_errors_total",
        "layer" => layer.name(),
        "operation" => operation
    )
    .increment(1);
}

/// Record a value promoted from a slower layer into `layer`.
pub fn record_promotion(layer: Layer) {
    counter!("tiered_cache_promotions_total", "layer" => layer.name()).increment(1);
}

/// Record keys removed by tag invalidation or a layer flush.
pub fn record_evictions(layer: Layer, count: u64) {
    counter!("tiered_cache_evictions_total", "layer" => layer.name()).increment(count);
}

/// Record a compressed write.
pub fn record_compression(layer: Layer, stats: &CompressionStats) {
    histogram!("tiered_cache_compression_ratio", "layer" => layer.name()).record(stats.ratio);
    counter!("tiered_cache_compressed_bytes_saved_total", "layer" => layer.name())
        .increment(stats.original_bytes.saturating_sub(stats.compressed_bytes) as u64);
}

/// Set backend health (1 = healthy, 0 = unhealthy).
pub fn set_layer_healthy(layer: Layer, healthy: bool) {
    gauge!("tiered_cache_layer_healthy", "layer" => layer.name())
        .set(if healthy { 1.0 } else { 0.0 });
}

/// Set the number of keys found by the last admin scan.
pub fn set_layer_keys(layer: Layer, count: usize) {
    gauge!("tiered_cache_layer_keys", "layer" => layer.name()).set(count as f64);
}

/// Set engine state (for dashboards).
///
/// Exactly one `state` label reads 1 at a time; the others are zeroed.
/// Transitions are also counted.
pub fn set_engine_state(state: EngineState) {
    for candidate in EngineState::ALL {
        gauge!("tiered_cache_engine_state", "state" => candidate.as_str())
            .set(if candidate == state { 1.0 } else { 0.0 });
    }
    counter!("tiered_cache_state_transitions_total", "state" => state.as_str()).increment(1);
}

/// Timer guard that records latency on drop.
pub struct LatencyTimer {
    layer: Layer,
    operation: &'static str,
    start: Instant,
}

impl LatencyTimer {
    #[must_use]
    pub fn new(layer: Layer, operation: &'static str) -> Self {
        Self { layer, operation, start: Instant::now() }
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        record_latency(self.layer, self.operation, self.start.elapsed());
    }
}
