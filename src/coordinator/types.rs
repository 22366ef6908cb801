// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the tiered cache coordinator.

use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use thiserror::Error;

use crate::layer::{Layer, LayerRef};
use crate::storage::traits::StoreError;

/// Engine lifecycle state.
///
/// Use [`super::TieredCache::state()`] to check current state or
/// [`super::TieredCache::state_receiver()`] to watch for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Just created, no stores bound
    Created,
    /// Opening one store per layer
    Connecting,
    /// Running the startup warm-up list
    WarmingUp,
    /// Serving requests
    Ready,
    /// Closing stores
    ShuttingDown,
    /// All stores closed
    Stopped,
}

impl EngineState {
    /// Every state, in lifecycle order.
    pub const ALL: [EngineState; 6] = [
        Self::Created,
        Self::Connecting,
        Self::WarmingUp,
        Self::Ready,
        Self::ShuttingDown,
        Self::Stopped,
    ];

    /// Label used for the state gauge.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Connecting => "connecting",
            Self::WarmingUp => "warming_up",
            Self::Ready => "ready",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Connecting => write!(f, "Connecting"),
            Self::WarmingUp => write!(f, "WarmingUp"),
            Self::Ready => write!(f, "Ready"),
            Self::ShuttingDown => write!(f, "ShuttingDown"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Errors surfaced to callers.
///
/// Store failures never show up here: they are logged, counted and turned
/// into misses or no-ops. What remains are wiring problems.
#[derive(Error, Debug)]
pub enum CacheError {
    /// No store is bound for the layer (the engine was never started).
    #[error("no backing store bound for layer {0}")]
    Unbound(Layer),
    /// A layer's store could not be reached during [`start`](super::TieredCache::start).
    #[error("failed to connect layer {layer}: {source}")]
    Connect {
        layer: Layer,
        #[source]
        source: StoreError,
    },
}

/// Options for [`get`](super::TieredCache::get) and
/// [`delete`](super::TieredCache::delete).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Explicit layer. `None` classifies the key.
    pub layer: Option<LayerRef>,
}

impl GetOptions {
    #[must_use]
    pub fn in_layer(layer: impl Into<LayerRef>) -> Self {
        Self { layer: Some(layer.into()) }
    }
}

/// Delete takes the same options as get.
pub type DeleteOptions = GetOptions;

/// Options for [`set`](super::TieredCache::set).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tiered_cache::{Layer, SetOptions};
///
/// let options = SetOptions::in_layer(Layer::L1)
///     .with_ttl(Duration::from_secs(60))
///     .with_tags(["users", "profiles"]);
///
/// assert_eq!(options.tags.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Explicit layer. `None` classifies the key and value.
    pub layer: Option<LayerRef>,
    /// Overrides the layer's default TTL
    pub ttl: Option<Duration>,
    /// Tags to index the key under, in the same layer
    pub tags: Vec<String>,
}

impl SetOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn in_layer(layer: impl Into<LayerRef>) -> Self {
        Self { layer: Some(layer.into()), ..Self::default() }
    }

    #[must_use]
    pub fn with_layer(mut self, layer: impl Into<LayerRef>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub(super) fn lookup(&self) -> GetOptions {
        GetOptions { layer: self.layer.clone() }
    }
}

/// Error type returned by warm-up fetchers.
pub type FetchError = Box<dyn std::error::Error + Send + Sync>;

/// Boxed one-shot producer of a warm-up value.
pub type Fetcher = Box<dyn FnOnce() -> BoxFuture<'static, Result<Value, FetchError>> + Send>;

/// One entry of a warm-up list: the fetcher only runs when `key` is absent.
pub struct WarmEntry {
    pub key: String,
    pub fetcher: Fetcher,
    pub options: SetOptions,
}

impl WarmEntry {
    pub fn new<F, Fut>(key: impl Into<String>, options: SetOptions, fetcher: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, FetchError>> + Send + 'static,
    {
        Self {
            key: key.into(),
            fetcher: Box::new(move || fetcher().boxed()),
            options,
        }
    }
}

impl std::fmt::Debug for WarmEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarmEntry")
            .field("key", &self.key)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Outcome counts of a warm-up run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmupReport {
    /// Fetched and written
    pub warmed: usize,
    /// Already cached, fetcher not called
    pub skipped: usize,
    /// Fetcher returned an error
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum WarmOutcome {
    Warmed,
    Skipped,
    Failed,
}

impl WarmupReport {
    pub(super) fn tally(outcomes: impl IntoIterator<Item = WarmOutcome>) -> Self {
        let mut report = Self::default();
        for outcome in outcomes {
            match outcome {
                WarmOutcome::Warmed => report.warmed += 1,
                WarmOutcome::Skipped => report.skipped += 1,
                WarmOutcome::Failed => report.failed += 1,
            }
        }
        report
    }
}
