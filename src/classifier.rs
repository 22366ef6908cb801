// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Placement classifier: picks a layer for a key when the caller doesn't.
//!
//! Hints are substring matches over the lowercased key, checked in a fixed
//! order (first match wins):
//!
//! | Hint                                         | Layer |
//! |----------------------------------------------|-------|
//! | configuration (`config`, `setting`, ...)     | `l4`  |
//! | aggregates (`stats`, `analytics`, ...)       | `l3`  |
//! | identity (`user:`, `session`, `profile`, ...) | `l1`  |
//! | listings and lookups (`list`, `page`, ...)   | `l2`  |
//!
//! With no hint, values serializing to more than [`LARGE_VALUE_BYTES`] go
//! to `l3`, everything else to `l2`.

use serde_json::Value;

use crate::layer::Layer;

/// Values above this size land in the slow layer when no key hint matches.
pub const LARGE_VALUE_BYTES: usize = 10 * 1024;

const CONFIG_HINTS: &[&str] = &["config", "setting", "feature_flag", "feature-flag", "permission"];
const AGGREGATE_HINTS: &[&str] = &[
    "stats", "statistic", "analytics", "report", "aggregate", "summary", "metric", "dashboard",
];
const IDENTITY_HINTS: &[&str] = &["user:", "session", "profile", "auth:", "token", "account:"];
const LOOKUP_HINTS: &[&str] = &["list", "page", "search", "detail", "by_id", "by-id"];

const RULES: &[(&[&str], Layer)] = &[
    (CONFIG_HINTS, Layer::L4),
    (AGGREGATE_HINTS, Layer::L3),
    (IDENTITY_HINTS, Layer::L1),
    (LOOKUP_HINTS, Layer::L2),
];

/// Pick the layer that should own `key`.
///
/// Pure and total: the same inputs always give the same layer.
///
/// ```
/// use tiered_cache::{classify, Layer};
/// use serde_json::json;
///
/// assert_eq!(classify("user:42:profile", None), Layer::L1);
/// assert_eq!(classify("site:config", None), Layer::L4);
/// assert_eq!(classify("task:42", Some(&json!({"title": "Ship"}))), Layer::L2);
/// ```
#[must_use]
pub fn classify(key: &str, value: Option<&Value>) -> Layer {
    let key = key.to_ascii_lowercase();

    for (hints, layer) in RULES {
        if hints.iter().any(|hint| key.contains(hint)) {
            return *layer;
        }
    }

    match value {
        Some(value) if serialized_len(value) > LARGE_VALUE_BYTES => Layer::L3,
        _ => Layer::L2,
    }
}

fn serialized_len(value: &Value) -> usize {
    // Serializing a Value can't fail; treat the impossible case as small.
    serde_json::to_vec(value).map(|bytes| bytes.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_hints() {
        let cases = [
            ("user:42", Layer::L1),
            ("session:abc", Layer::L1),
            ("account:7:preferences", Layer::L1),
            ("Profile:Alice", Layer::L1),
            ("auth:refresh-token:9", Layer::L1),
            ("products:list:page:2", Layer::L2),
            ("posts:search:rust", Layer::L2),
            ("course:detail:7", Layer::L2),
            ("product:by_id:7", Layer::L2),
            ("blog:stats:monthly", Layer::L3),
            ("affiliate:analytics", Layer::L3),
            ("sales:report:2025", Layer::L3),
            ("app:config", Layer::L4),
            ("tenant:settings", Layer::L4),
            ("feature_flag:beta", Layer::L4),
        ];
        for (key, expected) in cases {
            assert_eq!(classify(key, None), expected, "key {key}");
        }
    }

    #[test]
    fn test_earlier_rules_win() {
        // Configuration beats identity, aggregates beat listings
        assert_eq!(classify("user:42:settings", None), Layer::L4);
        assert_eq!(classify("orders:list:summary", None), Layer::L3);
        assert_eq!(classify("user:42:stats", None), Layer::L3);
    }

    #[test]
    fn test_plural_listing_key_is_not_identity() {
        assert_eq!(classify("users:list", None), Layer::L2);
    }

    #[test]
    fn test_default_is_medium_layer() {
        assert_eq!(classify("task:42", None), Layer::L2);
        assert_eq!(classify("", None), Layer::L2);
        assert_eq!(classify("task:42", Some(&json!({"title": "Ship"}))), Layer::L2);
    }

    #[test]
    fn test_large_value_goes_to_slow_layer() {
        let big = json!({"blob": "x".repeat(LARGE_VALUE_BYTES)});
        assert_eq!(classify("task:42", Some(&big)), Layer::L3);
    }

    #[test]
    fn test_key_hint_beats_value_size() {
        let big = json!({"blob": "x".repeat(LARGE_VALUE_BYTES)});
        assert_eq!(classify("user:1", Some(&big)), Layer::L1);
    }

    #[test]
    fn test_size_threshold_is_exclusive() {
        // JSON string of exactly LARGE_VALUE_BYTES bytes including quotes
        let exact = Value::String("x".repeat(LARGE_VALUE_BYTES - 2));
        assert_eq!(classify("blob", Some(&exact)), Layer::L2);

        let over = Value::String("x".repeat(LARGE_VALUE_BYTES - 1));
        assert_eq!(classify("blob", Some(&over)), Layer::L3);
    }

    #[test]
    fn test_deterministic() {
        let value = json!({"a": [1, 2, 3]});
        for key in ["user:1", "x", "list:all", "stats"] {
            assert_eq!(classify(key, Some(&value)), classify(key, Some(&value)));
        }
    }
}
