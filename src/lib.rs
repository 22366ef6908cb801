// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Tiered Cache
//!
//! A four-layer cache over TTL-capable key-value stores, with automatic
//! placement, read-through promotion and tag-based invalidation.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Placement Classifier                    │
//! │  • Key hints (user:, stats, config, list, ...)              │
//! │  • Large values (> 10 KB) go cold                           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌───────────────┬───────────────┬───────────────┬─────────────┐
//! │  L1: hot      │  L2: warm     │  L3: cold     │ L4: durable │
//! │  5 min        │  30 min       │  2 h, zstd    │ 24 h, zstd  │
//! └───────────────┴───────────────┴───────────────┴─────────────┘
//!         ▲               │               │               │
//!         └──── promotion on hit below the starting layer ┘
//! ```
//!
//! Each layer is backed by its own [`BackingStore`] with a `<layer>:` key
//! namespace. Tags are set records (`tag:<tag>`) stored next to the keys
//! they index.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tiered_cache::{TieredCache, TieredCacheConfig, GetOptions, SetOptions};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TieredCacheConfig::from_env()?;
//!     let mut cache = TieredCache::new(config);
//!
//!     // Connect one Redis store per layer
//!     cache.start().await?;
//!
//!     // Placement by key: "user:" keys live in l1
//!     let options = SetOptions::default().with_tags(["users"]);
//!     cache.set("user:42", &json!({"name": "Ada"}), options).await?;
//!
//!     // Cascades l1 → l4 and promotes on a deep hit
//!     if let Some(user) = cache.get("user:42", GetOptions::default()).await? {
//!         println!("Found: {}", user);
//!     }
//!
//!     cache.invalidate_by_tags(&["users"]).await?;
//!     cache.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Failure model
//!
//! Store failures never reach callers. A failed read is a miss, a failed
//! write is a no-op; both are logged with `tracing` and counted with
//! `metrics`. See [`CacheError`] for what does surface.
//!
//! ## Modules
//!
//! - [`coordinator`]: The [`TieredCache`] engine
//! - [`layer`]: Layers and their registry
//! - [`classifier`]: Key/value placement
//! - [`compression`]: JSON + zstd value codec
//! - [`storage`]: Backing stores (Redis, in-memory)
//! - [`stats`]: Hit/miss counters and snapshots
//! - [`resilience`]: Retry with backoff
//! - [`config`]: Configuration loading

pub mod config;
pub mod layer;
pub mod classifier;
pub mod compression;
pub mod storage;
pub mod resilience;
pub mod stats;
pub mod coordinator;
pub mod metrics;

// Note: We don't expose a `tracing` module to avoid conflict with the tracing crate

pub use config::{LayerSettings, StoreConnection, TieredCacheConfig};
pub use layer::{Layer, LayerDefinition, LayerRef, LayerRegistry, UnknownLayer};
pub use classifier::classify;
pub use coordinator::{
    CacheError, DeleteOptions, EngineState, FetchError, Fetcher, GetOptions, SetOptions,
    TieredCache, WarmEntry, WarmupReport,
};
pub use stats::{AdminStatsSnapshot, LayerKeyReport, LayerStatsSnapshot, StatsSnapshot};
pub use storage::traits::{BackingStore, StoreError};
pub use storage::memory::InMemoryStore;
pub use storage::redis::RedisStore;
pub use resilience::retry::RetryConfig;
pub use metrics::LatencyTimer;
