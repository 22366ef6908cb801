// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache layers and the layer registry.
//!
//! The set of layers is closed: [`Layer`] enumerates them in cascade order,
//! fastest first. Per-layer policy (TTL, key budget, compression) comes from
//! configuration and is frozen in a [`LayerRegistry`] at startup.
//!
//! ```text
//!   l1 (hot, 5m) → l2 (warm, 30m) → l3 (cold, 2h, zstd) → l4 (durable, 24h, zstd)
//! ```
//!
//! # Example
//!
//! ```
//! use tiered_cache::{Layer, LayerRegistry, TieredCacheConfig};
//!
//! let registry = LayerRegistry::from_config(&TieredCacheConfig::default());
//! assert_eq!(registry.next_layer(Layer::L1), Some(Layer::L2));
//! assert_eq!(registry.next_layer(Layer::L4), None);
//! assert_eq!(registry.resolve("L3").map(|d| d.layer), Some(Layer::L3));
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::TieredCacheConfig;

/// One tier of the cache, ordered fastest to slowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    L1,
    L2,
    L3,
    L4,
}

impl Layer {
    /// All layers in cascade order.
    pub const ALL: [Layer; 4] = [Layer::L1, Layer::L2, Layer::L3, Layer::L4];

    /// Lowercase name, also used as the store key namespace.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::L1 => "l1",
            Self::L2 => "l2",
            Self::L3 => "l3",
            Self::L4 => "l4",
        }
    }

    /// Position in cascade order (0 = fastest).
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Key prefix applied by the layer's backing store.
    #[must_use]
    pub fn namespace(self) -> String {
        format!("{}:", self.name())
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a layer name doesn't match any registered layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown cache layer '{0}'")]
pub struct UnknownLayer(pub String);

impl FromStr for Layer {
    type Err = UnknownLayer;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Layer::ALL
            .into_iter()
            .find(|layer| layer.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownLayer(s.to_string()))
    }
}

/// A caller's layer choice: either a known layer or a raw name from outside
/// the process that may not resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerRef {
    Known(Layer),
    Named(String),
}

impl From<Layer> for LayerRef {
    fn from(layer: Layer) -> Self {
        Self::Known(layer)
    }
}

impl From<&str> for LayerRef {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for LayerRef {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

/// Immutable policy for one layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerDefinition {
    pub layer: Layer,
    /// Default expiry for writes without an explicit TTL
    pub ttl: Duration,
    /// Soft key budget, used for reporting only
    pub max_keys: u64,
    /// Compress serialized values above [`crate::compression::COMPRESSION_THRESHOLD`]
    pub compression_enabled: bool,
    /// Multiplier for the synthetic size estimate
    pub weight: u64,
}

/// Ordered, read-only set of layer definitions.
#[derive(Debug, Clone)]
pub struct LayerRegistry {
    definitions: [LayerDefinition; 4],
}

impl LayerRegistry {
    /// Build the registry from configuration. Order is fixed by [`Layer::ALL`].
    #[must_use]
    pub fn from_config(config: &TieredCacheConfig) -> Self {
        let definitions = Layer::ALL.map(|layer| {
            let settings = config.layer(layer);
            LayerDefinition {
                layer,
                ttl: Duration::from_millis(settings.ttl_ms),
                max_keys: settings.max_keys,
                compression_enabled: settings.compression,
                weight: 1u64 << layer.index(),
            }
        });
        Self { definitions }
    }

    /// Look up a layer by name (case-insensitive).
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&LayerDefinition> {
        name.parse::<Layer>().ok().map(|layer| self.definition(layer))
    }

    /// Resolve a caller's layer choice to a layer.
    ///
    /// Only [`LayerRef::Named`] can fail.
    pub fn resolve_ref(&self, layer: &LayerRef) -> Result<Layer, UnknownLayer> {
        match layer {
            LayerRef::Known(layer) => Ok(*layer),
            LayerRef::Named(name) => name.parse(),
        }
    }

    #[inline]
    #[must_use]
    pub fn definition(&self, layer: Layer) -> &LayerDefinition {
        &self.definitions[layer.index()]
    }

    /// The next slower layer, or `None` at the end of the cascade.
    #[must_use]
    pub fn next_layer(&self, layer: Layer) -> Option<Layer> {
        Layer::ALL.get(layer.index() + 1).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LayerDefinition> {
        self.definitions.iter()
    }
}
