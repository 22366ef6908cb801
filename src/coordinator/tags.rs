// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Tag index: group keys under labels and drop whole groups at once.
//!
//! Each tag is a set record `tag:<tag>` living in the same layer as the keys
//! it indexes. Records expire after [`TAG_TTL`] regardless of the TTLs of
//! their members, so a record can name keys that have already expired; the
//! delete just finds nothing.

use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info};

use crate::layer::Layer;
use crate::metrics;
use crate::storage::traits::BackingStore;

use super::{degrade, CacheError, TieredCache};

/// Lifetime of a tag record, refreshed on every registration.
pub const TAG_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Key prefix of tag records inside a layer.
///
/// Tag records share the key space with cache entries, so caller keys
/// starting with `tag:` are reported as tag records by
/// [`get_cache_stats`](TieredCache::get_cache_stats), left out of
/// [`flush_layer`](TieredCache::flush_layer)'s count, and on Redis collide
/// with the set of the same name (`WRONGTYPE`). Keep cache keys out of this
/// prefix.
pub const TAG_PREFIX: &str = "tag:";

#[inline]
pub(super) fn tag_key(tag: &str) -> String {
    format!("{}{}", TAG_PREFIX, tag)
}

impl TieredCache {
    /// Add `key` to each tag's record in `layer`.
    pub(super) async fn register_tags(
        &self,
        key: &str,
        tags: &[String],
        layer: Layer,
    ) -> Result<(), CacheError> {
        let store = self.store(layer)?;
        for tag in tags {
            let record = tag_key(tag);
            if degrade(layer, "tag_add", &record, store.add_to_set(&record, key)).await.is_some() {
                degrade(layer, "tag_expire", &record, store.expire_set(&record, TAG_TTL.as_secs()))
                    .await;
            }
        }
        debug!(key, layer = %layer, tags = tags.len(), "Registered tags");
        Ok(())
    }

    /// Delete every key recorded under any of `tags`, in every layer.
    ///
    /// All (tag, layer) pairs run concurrently; a failing pair is logged and
    /// the others still complete. Deleted keys count as evictions. Running
    /// the same invalidation twice is harmless.
    ///
    /// ```rust,no_run
    /// # use tiered_cache::TieredCache;
    /// # async fn example(cache: &TieredCache) -> Result<(), tiered_cache::CacheError> {
    /// cache.invalidate_by_tags(&["users", "courses"]).await?;
    /// # Ok(())
    /// # }
    /// ```
    #[tracing::instrument(skip(self, tags), fields(tags = tags.len()))]
    pub async fn invalidate_by_tags<S: AsRef<str>>(&self, tags: &[S]) -> Result<u64, CacheError> {
        let mut pairs = Vec::with_capacity(tags.len() * Layer::ALL.len());
        for tag in tags {
            for definition in self.registry.iter() {
                let layer = definition.layer;
                pairs.push((tag.as_ref(), layer, self.store(layer)?));
            }
        }

        let removed: u64 = join_all(
            pairs
                .into_iter()
                .map(|(tag, layer, store)| self.invalidate_tag(tag, layer, &**store)),
        )
        .await
        .into_iter()
        .sum();

        info!(tags = tags.len(), removed, "Invalidated tags");
        Ok(removed)
    }

    async fn invalidate_tag(&self, tag: &str, layer: Layer, store: &dyn BackingStore) -> u64 {
        let record = tag_key(tag);
        let Some(members) = degrade(layer, "tag_members", &record, store.set_members(&record)).await
        else {
            return 0;
        };

        let mut removed = 0;
        for member in &members {
            removed += degrade(layer, "delete", member, store.delete(member)).await.unwrap_or(0);
        }
        degrade(layer, "tag_delete", &record, store.delete(&record)).await;

        if removed > 0 {
            self.stats.record_evictions(removed);
            metrics::record_evictions(layer, removed);
        }
        debug!(tag, layer = %layer, members = members.len(), removed, "Invalidated tag");
        removed
    }
}
