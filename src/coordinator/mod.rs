// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Tiered cache coordinator.
//!
//! The [`TieredCache`] ties together:
//! - the [`LayerRegistry`] (per-layer TTL, key budget, compression)
//! - one [`BackingStore`] per layer
//! - the placement [`classify`]er
//! - the [`StatsAggregator`]
//!
//! # Lifecycle
//!
//! ```text
//! Created → Connecting → (WarmingUp) → Ready → ShuttingDown → Stopped
//! ```
//!
//! # Failure model
//!
//! A cache is an optimisation, so a failing store must never fail the
//! caller. Every store call goes through [`degrade`]: errors are logged,
//! counted, and become a miss (reads) or a no-op (writes). The only errors
//! callers see are [`CacheError`]s about wiring.
//!
//! # Example
//!
//! ```rust,no_run
//! use tiered_cache::{TieredCache, TieredCacheConfig, EngineState, GetOptions, SetOptions};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), tiered_cache::CacheError> {
//! let mut cache = TieredCache::new(TieredCacheConfig::default());
//! assert_eq!(cache.state(), EngineState::Created);
//!
//! cache.start().await?;
//! cache.set("user:42", &json!({"name": "Ada"}), SetOptions::default()).await?;
//! let user = cache.get("user:42", GetOptions::default()).await?;
//! assert!(user.is_some());
//! cache.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod types;
mod api;
mod tags;
mod report;
mod lifecycle;

pub use types::{
    CacheError, DeleteOptions, EngineState, FetchError, Fetcher, GetOptions, SetOptions,
    WarmEntry, WarmupReport,
};

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tracing::warn;

use crate::classifier::classify;
use crate::config::TieredCacheConfig;
use crate::layer::{Layer, LayerRef, LayerRegistry};
use crate::stats::StatsAggregator;
use crate::storage::traits::{BackingStore, StoreError};

/// Multi-layer cache engine.
///
/// # Thread Safety
///
/// The engine is `Send + Sync`; share it behind an `Arc`. Counters are
/// atomics and stores handle their own connection sharing.
pub struct TieredCache {
    /// Configuration the engine was built from
    pub(super) config: TieredCacheConfig,

    /// Frozen layer policies
    pub(super) registry: LayerRegistry,

    /// One store per layer, indexed by [`Layer::index`]. `None` until started.
    pub(super) stores: [Option<Arc<dyn BackingStore>>; 4],

    /// Hit/miss counters
    pub(super) stats: StatsAggregator,

    /// Engine state (broadcast to watchers)
    pub(super) state: watch::Sender<EngineState>,
}

impl TieredCache {
    /// Create an unstarted engine.
    ///
    /// The engine starts in `Created` state with no stores bound. Call
    /// [`start()`](Self::start) to connect one Redis store per layer, or
    /// build with [`with_stores()`](Self::with_stores) instead.
    #[must_use]
    pub fn new(config: TieredCacheConfig) -> Self {
        let (state, _) = watch::channel(EngineState::Created);
        Self {
            registry: LayerRegistry::from_config(&config),
            config,
            stores: Default::default(),
            stats: StatsAggregator::new(),
            state,
        }
    }

    /// Create a ready engine over caller-provided stores, one per layer.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use tiered_cache::{BackingStore, InMemoryStore, TieredCache, TieredCacheConfig, EngineState};
    ///
    /// let cache = TieredCache::with_stores(TieredCacheConfig::default(), |layer| {
    ///     Arc::new(InMemoryStore::with_prefix(&layer.namespace())) as Arc<dyn BackingStore>
    /// });
    /// assert_eq!(cache.state(), EngineState::Ready);
    /// ```
    #[must_use]
    pub fn with_stores<F>(config: TieredCacheConfig, mut factory: F) -> Self
    where
        F: FnMut(Layer) -> Arc<dyn BackingStore>,
    {
        let mut cache = Self::new(config);
        cache.stores = Layer::ALL.map(|layer| Some(factory(layer)));
        cache.set_state(EngineState::Ready);
        cache
    }

    /// Get current engine state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    /// Get a receiver to watch state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    /// Check if engine is ready to accept requests.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.state(), EngineState::Ready)
    }

    #[must_use]
    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &TieredCacheConfig {
        &self.config
    }

    pub(super) fn set_state(&self, state: EngineState) {
        self.state.send_replace(state);
        crate::metrics::set_engine_state(state);
    }

    /// The store bound to `layer`.
    pub(super) fn store(&self, layer: Layer) -> Result<&Arc<dyn BackingStore>, CacheError> {
        self.stores[layer.index()].as_ref().ok_or(CacheError::Unbound(layer))
    }

    /// Pick the layer for an operation: the caller's choice when given,
    /// otherwise the classifier's. An unknown layer name yields `None`,
    /// which callers treat as a miss or no-op.
    pub(super) fn target_layer(
        &self,
        key: &str,
        layer: Option<&LayerRef>,
        value: Option<&Value>,
    ) -> Option<Layer> {
        match layer {
            None => Some(classify(key, value)),
            Some(layer) => match self.registry.resolve_ref(layer) {
                Ok(layer) => Some(layer),
                Err(e) => {
                    warn!(key, error = %e, "Unknown cache layer, ignoring operation");
                    None
                }
            },
        }
    }
}

/// Await a store call, turning a failure into `None` after logging and
/// counting it.
pub(super) async fn degrade<T, Fut>(
    layer: Layer,
    operation: &'static str,
    key: &str,
    call: Fut,
) -> Option<T>
where
    Fut: Future<Output = Result<T, StoreError>>,
{
    match call.await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(layer = %layer, operation, key, error = %e, "Cache store call failed, degrading");
            crate::metrics::record_error(layer, operation);
            None
        }
    }
}
