// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the tiered cache.
//!
//! # Example
//!
//! ```
//! use tiered_cache::{Layer, TieredCacheConfig};
//!
//! // Minimal config (uses defaults)
//! let config = TieredCacheConfig::default();
//! assert_eq!(config.layer(Layer::L1).ttl_ms, 5 * 60 * 1000);
//! assert_eq!(config.connection_url(Layer::L1), "redis://127.0.0.1:6379");
//!
//! // L3 on its own Redis instance, with a shorter TTL
//! let mut config = TieredCacheConfig::default();
//! config.l3.ttl_ms = 60 * 60 * 1000;
//! config.l3.connection = Some(tiered_cache::StoreConnection {
//!     host: "cache-cold.internal".into(),
//!     ..Default::default()
//! });
//! assert_eq!(config.connection_url(Layer::L3), "redis://cache-cold.internal:6379");
//! ```

use config::{Config, Environment};
use serde::Deserialize;

use crate::layer::Layer;

/// Connection parameters for one backing store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConnection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Optional AUTH password
    #[serde(default)]
    pub password: Option<String>,

    /// Logical database index
    #[serde(default)]
    pub db: Option<u32>,

    /// Connection attempts before startup fails
    #[serde(default = "default_retries")]
    pub retries: usize,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 6379 }
fn default_retries() -> usize { 5 }

impl Default for StoreConnection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: None,
            db: None,
            retries: default_retries(),
        }
    }
}

impl StoreConnection {
    /// Redis URL: `redis://[:password@]host:port[/db]`
    #[must_use]
    pub fn url(&self) -> String {
        let auth = match self.password.as_deref() {
            Some(password) if !password.is_empty() => format!(":{}@", password),
            _ => String::new(),
        };
        let db = self.db.map(|db| format!("/{}", db)).unwrap_or_default();
        format!("redis://{}{}:{}{}", auth, self.host, self.port, db)
    }
}

/// Policy for one cache layer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LayerSettings {
    /// Default TTL in milliseconds
    pub ttl_ms: u64,

    /// Soft key budget (reporting only)
    pub max_keys: u64,

    /// Compress values larger than 1 KiB
    #[serde(default)]
    pub compression: bool,

    /// Per-layer connection; falls back to [`TieredCacheConfig::connection`]
    #[serde(default)]
    pub connection: Option<StoreConnection>,
}

impl LayerSettings {
    fn new(ttl_ms: u64, max_keys: u64, compression: bool) -> Self {
        Self { ttl_ms, max_keys, compression, connection: None }
    }
}

/// Configuration for the tiered cache.
///
/// Layer order is fixed (`l1` → `l4`); only the policy of each layer is
/// configurable.
#[derive(Debug, Clone, Deserialize)]
pub struct TieredCacheConfig {
    /// Default connection shared by all layers
    #[serde(default)]
    pub connection: StoreConnection,

    #[serde(default = "default_l1")]
    pub l1: LayerSettings,
    #[serde(default = "default_l2")]
    pub l2: LayerSettings,
    #[serde(default = "default_l3")]
    pub l3: LayerSettings,
    #[serde(default = "default_l4")]
    pub l4: LayerSettings,
}

const MINUTE_MS: u64 = 60 * 1000;

fn default_l1() -> LayerSettings { LayerSettings::new(5 * MINUTE_MS, 1_000, false) }
fn default_l2() -> LayerSettings { LayerSettings::new(30 * MINUTE_MS, 10_000, false) }
fn default_l3() -> LayerSettings { LayerSettings::new(120 * MINUTE_MS, 50_000, true) }
fn default_l4() -> LayerSettings { LayerSettings::new(24 * 60 * MINUTE_MS, 100_000, true) }

impl Default for TieredCacheConfig {
    fn default() -> Self {
        Self {
            connection: StoreConnection::default(),
            l1: default_l1(),
            l2: default_l2(),
            l3: default_l3(),
            l4: default_l4(),
        }
    }
}

impl TieredCacheConfig {
    /// Load configuration from `TIERED_CACHE__*` environment variables.
    ///
    /// Nested fields use `__` as separator, e.g.
    /// `TIERED_CACHE__CONNECTION__HOST=redis.internal` or
    /// `TIERED_CACHE__L3__TTL_MS=600000`.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(Environment::with_prefix("TIERED_CACHE").separator("__"))
    }

    /// Load from any `config` source (handy for tests and embedding).
    pub fn from_source<S>(source: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        Config::builder().add_source(source).build()?.try_deserialize()
    }

    #[must_use]
    pub fn layer(&self, layer: Layer) -> &LayerSettings {
        match layer {
            Layer::L1 => &self.l1,
            Layer::L2 => &self.l2,
            Layer::L3 => &self.l3,
            Layer::L4 => &self.l4,
        }
    }

    /// Effective connection for a layer.
    #[must_use]
    pub fn connection(&self, layer: Layer) -> &StoreConnection {
        self.layer(layer).connection.as_ref().unwrap_or(&self.connection)
    }

    #[must_use]
    pub fn connection_url(&self, layer: Layer) -> String {
        self.connection(layer).url()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    #[test]
    fn test_defaults() {
        let config = TieredCacheConfig::default();
        assert_eq!(config.l2.ttl_ms, 30 * 60 * 1000);
        assert!(!config.l2.compression);
        assert!(config.l4.compression);
        assert_eq!(config.connection.retries, 5);
    }

    #[test]
    fn test_url_with_password_and_db() {
        let conn = StoreConnection {
            host: "redis.internal".into(),
            port: 6380,
            password: Some("s3cret".into()),
            db: Some(2),
            retries: 1,
        };
        assert_eq!(conn.url(), "redis://:s3cret@redis.internal:6380/2");
    }

    #[test]
    fn test_empty_password_is_ignored() {
        let conn = StoreConnection { password: Some(String::new()), ..Default::default() };
        assert_eq!(conn.url(), "redis://127.0.0.1:6379");
    }

    #[test]
    fn test_per_layer_connection_override() {
        let mut config = TieredCacheConfig::default();
        config.l4.connection = Some(StoreConnection { port: 7000, ..Default::default() });

        assert_eq!(config.connection_url(Layer::L1), "redis://127.0.0.1:6379");
        assert_eq!(config.connection_url(Layer::L4), "redis://127.0.0.1:7000");
    }

    #[test]
    fn test_partial_source_keeps_defaults() {
        let source = File::from_str(
            r#"
            [connection]
            host = "cache.local"

            [l3]
            ttl_ms = 1000
            max_keys = 10
            "#,
            FileFormat::Toml,
        );
        let config = TieredCacheConfig::from_source(source).unwrap();

        assert_eq!(config.connection.host, "cache.local");
        assert_eq!(config.connection.port, 6379);
        assert_eq!(config.l3.ttl_ms, 1000);
        assert!(!config.l3.compression);
        assert_eq!(config.l1, TieredCacheConfig::default().l1);
    }
}
