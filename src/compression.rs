// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Value codec: JSON serialization plus optional zstd compression.
//!
//! Compression is gated per layer and only applied once the serialized JSON
//! is larger than [`COMPRESSION_THRESHOLD`]. Decoding detects zstd by its
//! magic bytes, so a layer can switch compression on or off without
//! invalidating entries written under the old policy.
//!
//! # Example
//!
//! ```
//! use tiered_cache::compression::{encode, decode, is_compressed};
//! use serde_json::json;
//!
//! let value = json!({"body": "x".repeat(4096)});
//! let encoded = encode(&value, true)?;
//! assert!(is_compressed(&encoded.bytes));
//! assert_eq!(decode(&encoded.bytes), value);
//! # Ok::<(), tiered_cache::compression::CodecError>(())
//! ```

use serde_json::Value;

/// Zstd magic bytes (little-endian): 0xFD2FB528
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Default compression level (3 is a good balance of speed/ratio)
const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Serialized size above which compressing layers compress.
pub const COMPRESSION_THRESHOLD: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("compression failed: {0}")]
    CompressFailed(String),

    #[error("decompression failed: {0}")]
    DecompressFailed(String),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Check if data is zstd-compressed by checking magic bytes.
#[inline]
#[must_use]
pub fn is_compressed(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == ZSTD_MAGIC
}

/// Bytes ready for the store, plus what the codec did to them.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    /// Set when the payload was compressed
    pub stats: Option<CompressionStats>,
}

/// Serialize a value, compressing when `compress` is set and the JSON is
/// over the threshold.
pub fn encode(value: &Value, compress: bool) -> Result<Encoded, CodecError> {
    let json = serde_json::to_vec(value)?;
    if !compress || json.len() <= COMPRESSION_THRESHOLD {
        return Ok(Encoded { bytes: json, stats: None });
    }

    let compressed = compress_bytes(&json)?;
    let stats = CompressionStats::new(json.len(), compressed.len());
    Ok(Encoded { bytes: compressed, stats: Some(stats) })
}

/// Decode stored bytes back into a value.
///
/// Never fails: a payload that can't be decompressed or parsed comes back
/// as a JSON string holding the raw (lossy UTF-8) payload.
#[must_use]
pub fn decode(data: &[u8]) -> Value {
    match try_decode(data) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, bytes = data.len(), "Undecodable cache payload, returning raw");
            Value::String(String::from_utf8_lossy(data).into_owned())
        }
    }
}

/// Strict variant of [`decode`].
pub fn try_decode(data: &[u8]) -> Result<Value, CodecError> {
    if is_compressed(data) {
        let decompressed = decompress_bytes(data)?;
        Ok(serde_json::from_slice(&decompressed)?)
    } else {
        Ok(serde_json::from_slice(data)?)
    }
}

pub fn compress_bytes(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    zstd::encode_all(data, DEFAULT_COMPRESSION_LEVEL)
        .map_err(|e| CodecError::CompressFailed(e.to_string()))
}

/// Decompress bytes. Returns original bytes if not compressed.
pub fn decompress_bytes(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    if is_compressed(data) {
        zstd::decode_all(data).map_err(|e| CodecError::DecompressFailed(e.to_string()))
    } else {
        Ok(data.to_vec())
    }
}

/// Compression statistics for a single write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionStats {
    pub original_bytes: usize,
    pub compressed_bytes: usize,
    /// original / compressed
    pub ratio: f64,
    /// Space saved (0.0 - 1.0)
    pub savings: f64,
}

impl CompressionStats {
    #[must_use]
    pub fn new(original_bytes: usize, compressed_bytes: usize) -> Self {
        let ratio = if compressed_bytes > 0 {
            original_bytes as f64 / compressed_bytes as f64
        } else {
            0.0
        };
        let savings = if original_bytes > 0 {
            1.0 - (compressed_bytes as f64 / original_bytes as f64)
        } else {
            0.0
        };
        Self { original_bytes, compressed_bytes, ratio, savings }
    }
}
