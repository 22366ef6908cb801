//! Chaos Testing for the Tiered Cache
//!
//! Failure scenarios driven by [`FailingStore`], a wrapper around
//! [`InMemoryStore`] that can be switched into "transport down" mode or
//! fail at precise call counts. The engine must keep answering: failed
//! reads are misses, failed writes are no-ops, nothing is returned as an
//! error.
//!
//! # Running Chaos Tests
//! ```bash
//! cargo test --test chaos -- --nocapture
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde_json::json;

use tiered_cache::{
    BackingStore, FetchError, GetOptions, InMemoryStore, Layer, SetOptions, StoreError,
    TieredCache, TieredCacheConfig, WarmEntry, WarmupReport,
};

// =============================================================================
// Failing Store Wrapper - Precise Error Injection
// =============================================================================

/// A wrapper that injects transport failures.
pub struct FailingStore {
    inner: InMemoryStore,
    call_count: AtomicU64,
    /// Fail every call while set
    down: AtomicBool,
    /// Fail on these call numbers (1-indexed)
    fail_on_calls: Vec<u64>,
}

impl FailingStore {
    pub fn new(prefix: &str) -> Self {
        Self::failing_on(prefix, Vec::new())
    }

    pub fn failing_on(prefix: &str, fail_on_calls: Vec<u64>) -> Self {
        Self {
            inner: InMemoryStore::with_prefix(prefix),
            call_count: AtomicU64::new(0),
            down: AtomicBool::new(false),
            fail_on_calls,
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }

    fn maybe_fail(&self) -> Result<(), StoreError> {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        if self.down.load(Ordering::SeqCst) || self.fail_on_calls.contains(&count) {
            Err(StoreError::Backend("connection reset by peer".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BackingStore for FailingStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.maybe_fail()?;
        self.inner.get(key).await
    }

    async fn set_with_expiry(&self, key: &str, ttl_secs: u64, value: &[u8]) -> Result<(), StoreError> {
        self.maybe_fail()?;
        self.inner.set_with_expiry(key, ttl_secs, value).await
    }

    async fn delete(&self, key: &str) -> Result<u64, StoreError> {
        self.maybe_fail()?;
        self.inner.delete(key).await
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        self.maybe_fail()?;
        self.inner.scan_keys(pattern).await
    }

    async fn add_to_set(&self, set_key: &str, member: &str) -> Result<(), StoreError> {
        self.maybe_fail()?;
        self.inner.add_to_set(set_key, member).await
    }

    async fn set_members(&self, set_key: &str) -> Result<Vec<String>, StoreError> {
        self.maybe_fail()?;
        self.inner.set_members(set_key).await
    }

    async fn expire_set(&self, set_key: &str, ttl_secs: u64) -> Result<(), StoreError> {
        self.maybe_fail()?;
        self.inner.expire_set(set_key, ttl_secs).await
    }

    async fn ping(&self) -> Result<String, StoreError> {
        self.maybe_fail()?;
        self.inner.ping().await
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.inner.close().await
    }

    fn is_active(&self) -> bool {
        self.inner.is_active()
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn failing_stores() -> [Arc<FailingStore>; 4] {
    Layer::ALL.map(|layer| Arc::new(FailingStore::new(&layer.namespace())))
}

fn cache_over(stores: &[Arc<FailingStore>; 4]) -> TieredCache {
    TieredCache::with_stores(TieredCacheConfig::default(), |layer| {
        stores[layer.index()].clone() as Arc<dyn BackingStore>
    })
}

fn counter_value(snapshotter: &Snapshotter, name: &str) -> u64 {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter(|(key, ..)| key.key().name() == name)
        .map(|(.., value)| match value {
            DebugValue::Counter(v) => v,
            _ => 0,
        })
        .sum()
}

// =============================================================================
// Read Path
// =============================================================================

#[tokio::test]
async fn chaos_slowest_layer_down_does_not_affect_faster_hit() {
    let stores = failing_stores();
    let cache = cache_over(&stores);
    cache.set("k", &json!({"ok": true}), SetOptions::in_layer(Layer::L1)).await.unwrap();

    stores[3].set_down(true);

    let value = cache.get("k", GetOptions::in_layer(Layer::L1)).await.unwrap();
    assert_eq!(value, Some(json!({"ok": true})));
}

#[tokio::test]
async fn chaos_failed_layer_counts_as_miss_and_cascade_continues() {
    let stores = failing_stores();
    let cache = cache_over(&stores);
    cache.set("k", &json!(7), SetOptions::in_layer(Layer::L3)).await.unwrap();

    stores[1].set_down(true);

    let value = cache.get("k", GetOptions::in_layer(Layer::L1)).await.unwrap();
    assert_eq!(value, Some(json!(7)));

    // Promotion into the failing layer is dropped, the healthy one still filled
    assert!(stores[0].inner.contains("k"));
    assert!(!stores[1].inner.contains("k"));

    let stats = cache.get_statistics();
    assert_eq!(stats.layer(Layer::L2).unwrap().misses, 1);
    assert_eq!(stats.layer(Layer::L3).unwrap().hits, 1);
}

#[tokio::test]
async fn chaos_every_layer_down_reads_as_cold_cache() {
    let stores = failing_stores();
    let cache = cache_over(&stores);
    cache.set("k", &json!(1), SetOptions::in_layer(Layer::L2)).await.unwrap();

    for store in &stores {
        store.set_down(true);
    }

    assert_eq!(cache.get("k", GetOptions::in_layer(Layer::L1)).await.unwrap(), None);
    assert_eq!(cache.get_statistics().misses, 4);
}

#[tokio::test]
async fn chaos_transient_failure_on_single_call() {
    // Only the first l1 call fails
    let stores = Layer::ALL.map(|layer| {
        let fail_on = if layer == Layer::L1 { vec![1] } else { Vec::new() };
        Arc::new(FailingStore::failing_on(&layer.namespace(), fail_on))
    });
    let cache = cache_over(&stores);
    stores[0].inner.set_with_expiry("k", 60, b"1").await.unwrap();

    assert_eq!(cache.get("k", GetOptions::in_layer(Layer::L1)).await.unwrap(), None);
    assert_eq!(cache.get("k", GetOptions::in_layer(Layer::L1)).await.unwrap(), Some(json!(1)));
}

#[tokio::test]
async fn chaos_corrupt_payload_does_not_panic() {
    let stores = failing_stores();
    let cache = cache_over(&stores);

    // Zstd magic followed by garbage
    let garbage: [u8; 7] = [0x28, 0xB5, 0x2F, 0xFD, 0x00, 0xFF, 0x13];
    stores[2].inner.set_with_expiry("bad", 60, &garbage).await.unwrap();

    let value = cache.get("bad", GetOptions::in_layer(Layer::L3)).await.unwrap();
    assert!(matches!(value, Some(serde_json::Value::String(_))));
}

// =============================================================================
// Write Path
// =============================================================================

#[tokio::test]
async fn chaos_set_on_failing_layer_is_silent_noop() {
    let stores = failing_stores();
    let cache = cache_over(&stores);
    stores[0].set_down(true);

    let options = SetOptions::in_layer(Layer::L1).with_tags(["t"]);
    cache.set("k", &json!(1), options).await.unwrap();

    assert!(stores[0].inner.is_empty());
    assert_eq!(cache.get_statistics().layer(Layer::L1).unwrap().sets, 0);
}

#[tokio::test]
async fn chaos_tag_write_failure_keeps_value() {
    // Call 1 is SETEX, call 2 is SADD
    let stores = Layer::ALL.map(|layer| {
        let fail_on = if layer == Layer::L2 { vec![2] } else { Vec::new() };
        Arc::new(FailingStore::failing_on(&layer.namespace(), fail_on))
    });
    let cache = cache_over(&stores);

    let options = SetOptions::in_layer(Layer::L2).with_tags(["t"]);
    cache.set("k", &json!(1), options).await.unwrap();

    assert!(stores[1].inner.contains("k"));
    assert!(stores[1].inner.set_members("tag:t").await.unwrap().is_empty());
}

#[tokio::test]
async fn chaos_delete_on_failing_layer_reports_nothing_removed() {
    let stores = failing_stores();
    let cache = cache_over(&stores);
    cache.set("k", &json!(1), SetOptions::in_layer(Layer::L4)).await.unwrap();
    stores[3].set_down(true);

    let removed = cache.delete("k", GetOptions::in_layer(Layer::L4)).await.unwrap();

    assert!(!removed);
    assert!(stores[3].inner.contains("k"));
}

#[tokio::test]
async fn chaos_warmup_into_failing_layer_reports_failure() {
    let stores = failing_stores();
    let cache = cache_over(&stores);
    stores[0].set_down(true);

    let entries = vec![
        WarmEntry::new("user:9", SetOptions::default(), || async {
            Ok::<_, FetchError>(json!({"name": "Nine"}))
        }),
        WarmEntry::new("course:list", SetOptions::default(), || async {
            Ok::<_, FetchError>(json!(["rust"]))
        }),
    ];
    let report = cache.warm_cache(entries).await.unwrap();

    assert_eq!(report, WarmupReport { warmed: 1, skipped: 0, failed: 1 });
    assert!(!stores[0].inner.contains("user:9"));
    assert!(stores[1].inner.contains("course:list"));
}

// =============================================================================
// Invalidation & Admin
// =============================================================================

#[tokio::test]
async fn chaos_invalidation_continues_past_failing_layer() {
    let stores = failing_stores();
    let cache = cache_over(&stores);
    for layer in Layer::ALL {
        let options = SetOptions::in_layer(layer).with_tags(["shared"]);
        cache.set(&format!("k-{}", layer), &json!(1), options).await.unwrap();
    }

    stores[2].set_down(true);
    let removed = cache.invalidate_by_tags(&["shared"]).await.unwrap();

    assert_eq!(removed, 3);
    assert!(!stores[0].inner.contains("k-l1"));
    assert!(!stores[1].inner.contains("k-l2"));
    assert!(stores[2].inner.contains("k-l3"));
    assert!(!stores[3].inner.contains("k-l4"));

    // Layer back: a second pass picks up what was left
    stores[2].set_down(false);
    assert_eq!(cache.invalidate_by_tags(&["shared"]).await.unwrap(), 1);
}

#[tokio::test]
async fn chaos_health_and_admin_report_failing_layer() {
    let stores = failing_stores();
    let cache = cache_over(&stores);
    stores[1].set_down(true);

    let health = cache.health_check().await.unwrap();
    assert!(health[&Layer::L1]);
    assert!(!health[&Layer::L2]);

    let report = cache.get_cache_stats().await.unwrap();
    assert!(report.layers[0].error.is_none());
    let l2 = &report.layers[1];
    assert_eq!(l2.keys, 0);
    assert!(l2.error.as_deref().unwrap_or_default().contains("connection reset"));
}

#[tokio::test]
async fn chaos_shutdown_then_calls_degrade() {
    let stores = failing_stores();
    let cache = cache_over(&stores);
    cache.set("k", &json!(1), SetOptions::in_layer(Layer::L1)).await.unwrap();

    cache.shutdown().await;

    assert_eq!(cache.get("k", GetOptions::in_layer(Layer::L1)).await.unwrap(), None);
    cache.set("k2", &json!(1), SetOptions::in_layer(Layer::L1)).await.unwrap();
    assert!(!stores[0].inner.contains("k2"));
    let health = cache.health_check().await.unwrap();
    assert!(health.values().all(|healthy| !healthy));
}

#[tokio::test]
async fn chaos_degraded_calls_are_counted() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let _guard = metrics::set_default_local_recorder(&recorder);

    let stores = failing_stores();
    let cache = cache_over(&stores);
    stores[0].set_down(true);

    cache.get("k", GetOptions::in_layer(Layer::L1)).await.unwrap();
    cache.set("k", &json!(1), SetOptions::in_layer(Layer::L1)).await.unwrap();

    assert_eq!(counter_value(&snapshotter, "tiered_cache_errors_total"), 2);
    assert!(stores[0].calls() >= 2);
}
