// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic tiered-cache usage example.
//!
//! Demonstrates:
//! 1. Building the cache (in-memory stores, or Redis with `--redis`)
//! 2. Classified writes with tags
//! 3. Read-through promotion from a slow layer
//! 4. Tag invalidation
//! 5. Statistics, admin key scan and health
//! 6. Displaying metrics
//! 7. Clean shutdown
//!
//! # Run
//!
//! ```bash
//! # In-process stores
//! cargo run --example basic_usage
//!
//! # Redis (configured via TIERED_CACHE__CONNECTION__HOST etc.)
//! cargo run --example basic_usage -- --redis
//! ```

use std::sync::Arc;
use std::time::Instant;

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde_json::json;
use tiered_cache::{
    classify, BackingStore, FetchError, GetOptions, InMemoryStore, Layer, SetOptions,
    TieredCache, TieredCacheConfig,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Install metrics recorder (captures all metrics for export)
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║           tiered-cache: Basic Usage Example                   ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Build the cache
    // ─────────────────────────────────────────────────────────────────────────
    let config = TieredCacheConfig::from_env()?;
    let use_redis = std::env::args().any(|arg| arg == "--redis");

    let cache = if use_redis {
        println!("📦 Connecting one Redis store per layer...");
        let mut cache = TieredCache::new(config);
        cache.start().await?;
        cache
    } else {
        println!("📦 Using in-memory stores...");
        TieredCache::with_stores(config, |layer| {
            Arc::new(InMemoryStore::with_prefix(&layer.namespace())) as Arc<dyn BackingStore>
        })
    };
    println!("   ✅ Cache ready! State: {}", cache.state());

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Classified writes
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📝 Writing entries (layer picked by key)...");
    let entries = vec![
        ("user:alice", json!({"name": "Alice", "role": "admin"}), vec!["users"]),
        ("user:bob", json!({"name": "Bob", "role": "user"}), vec!["users"]),
        ("course:list", json!(["rust", "go", "zig"]), vec!["courses"]),
        ("stats:daily", json!({"requests": 42000, "latency_p99": 12}), vec![]),
        ("app:config", json!({"theme": "dark", "version": "2.0"}), vec![]),
    ];

    for (key, value, tags) in &entries {
        let options = SetOptions::default().with_tags(tags.iter().copied());
        cache.set(key, value, options).await?;
        println!("   └─ {} → {} ({})", key, value, classify(key, Some(value)));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Read-through promotion
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📖 Reading stats:daily starting from l1 (stored in l3)...");
    let start = Instant::now();
    let value = cache.get("stats:daily", GetOptions::in_layer(Layer::L1)).await?;
    println!("   └─ First read: {:?} ({:?})", value, start.elapsed());
    let start = Instant::now();
    cache.get("stats:daily", GetOptions::in_layer(Layer::L1)).await?;
    println!("   └─ Second read hits l1 after promotion ({:?})", start.elapsed());

    let course = cache
        .get_or_set_with("course:detail:rust", SetOptions::default(), || async {
            Ok::<_, FetchError>(json!({"title": "Rust", "lessons": 12}))
        })
        .await?;
    println!("   └─ get_or_set_with: {}", course);

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Tag invalidation
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🧹 Invalidating tag 'users'...");
    let removed = cache.invalidate_by_tags(&["users"]).await?;
    println!("   └─ Removed {} keys", removed);
    let alice = cache.get("user:alice", GetOptions::default()).await?;
    println!("   └─ user:alice now: {:?}", alice);

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Statistics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📊 Cache Statistics:");
    let stats = cache.get_statistics();
    println!("   ┌─ hits={} misses={} hit_rate={:.1}%", stats.hits, stats.misses, stats.hit_rate() * 100.0);
    println!("   ├─ operations={} evictions={}", stats.operations, stats.evictions);
    for layer in &stats.layers {
        println!("   │  └─ {}: hits={} misses={} size≈{}", layer.layer, layer.hits, layer.misses, layer.size);
    }

    let report = cache.get_cache_stats().await?;
    println!("   ├─ Key scan ({} entries total)", report.total_keys);
    for layer in &report.layers {
        println!(
            "   │  └─ {}: {} keys, {} tag records, {:.3}% of {}",
            layer.layer,
            layer.keys,
            layer.tag_records,
            layer.utilization * 100.0,
            layer.max_keys
        );
    }

    let health = cache.health_check().await?;
    println!("   └─ Health: {:?}", health);

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Dump raw metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📈 Raw Metrics:");
    dump_metrics(&snapshotter);

    // ─────────────────────────────────────────────────────────────────────────
    // 7. Clean shutdown
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🛑 Shutting down...");
    cache.shutdown().await;
    println!("   ✅ Shutdown complete! State: {}", cache.state());

    Ok(())
}

/// Dump all captured metrics, grouped by kind
fn dump_metrics(snapshotter: &Snapshotter) {
    let mut counters = Vec::new();
    let mut gauges = Vec::new();
    let mut histograms = Vec::new();

    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let name = format!("{}{{{}}}", key.name(), labels.join(","));

        match value {
            DebugValue::Counter(v) => counters.push((name, v)),
            DebugValue::Gauge(v) => gauges.push((name, v.into_inner())),
            DebugValue::Histogram(samples) => {
                let count = samples.len();
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                histograms.push((name, count, sum));
            }
        }
    }

    counters.sort_by(|a, b| a.0.cmp(&b.0));
    gauges.sort_by(|a, b| a.0.cmp(&b.0));
    histograms.sort_by(|a, b| a.0.cmp(&b.0));

    println!("   ┌─ Counters");
    for (name, value) in &counters {
        println!("   │  └─ {} = {}", name, value);
    }
    println!("   ├─ Gauges");
    for (name, value) in &gauges {
        println!("   │  └─ {} = {:.2}", name, value);
    }
    println!("   └─ Histograms");
    for (name, count, sum) in &histograms {
        println!("      └─ {} count={} sum={:.6}", name, count, sum);
    }
}
