//! Lossless compression for cold data.
//!
//! LZ4 via `lz4_flex`, used for audit trails and state snapshots. Fast enough
//! to sit on the write path of every workflow transition.

use crate::error::{ArgusError, ArgusResult};
use serde::{de::DeserializeOwned, Serialize};

/// Compress raw bytes using LZ4.
pub fn compress_lz4(data: &[u8]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(data)
}

/// Decompress LZ4-compressed bytes.
pub fn decompress_lz4(data: &[u8]) -> ArgusResult<Vec<u8>> {
    lz4_flex::decompress_size_prepended(data)
        .map_err(|e| ArgusError::Compression(format!("LZ4 decompress: {}", e)))
}

/// Serialize a value to JSON bytes, then compress with LZ4.
pub fn serialize_and_compress<T: Serialize>(value: &T) -> ArgusResult<Vec<u8>> {
    let json = serde_json::to_vec(value)?;
    Ok(compress_lz4(&json))
}

/// Decompress LZ4 bytes, then deserialize from JSON.
pub fn decompress_and_deserialize<T: DeserializeOwned>(data: &[u8]) -> ArgusResult<T> {
    let decompressed = decompress_lz4(data)?;
    let value: T = serde_json::from_slice(&decompressed)?;
    Ok(value)
}

/// Calculate compression ratio: original_size / compressed_size.
pub fn compression_ratio(original: usize, compressed: usize) -> f64 {
    if compressed == 0 {
        return 0.0;
    }
    original as f64 / compressed as f64
}
