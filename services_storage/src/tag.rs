//! Tag hashing
//!
//! Objects and properties are identified by string tags. Storage layouts
//! that cannot hold strings derive a numeric id from the tag instead.
//!
//! Known limitation: ids are not collision-checked. Two different tags that
//! hash to the same value share a block (positional) or key (preferences).

use crate::error::{StorageError, StorageResult};

/// Shortest tag the preferences backend accepts
pub const MIN_TAG_LEN: usize = 5;

/// Width of the decimal key derived by [`hashed_key`]
pub const HASHED_KEY_LEN: usize = 10;

/// FNV-1a over the tag bytes
fn fnv1a(tag: &str) -> u32 {
    const FNV_OFFSET_BASIS: u32 = 2166136261;
    const FNV_PRIME: u32 = 16777619;

    let mut hash = FNV_OFFSET_BASIS;
    for byte in tag.bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// 16-bit block id of a tag for the positional block store
///
/// Never returns 0, which marks the end of the block chain.
pub fn block_id(tag: &str) -> u16 {
    let hash = fnv1a(tag);
    match ((hash >> 16) ^ (hash & 0xFFFF)) as u16 {
        0 => 1,
        id => id,
    }
}

/// Fixed-width numeric key for stores with short key limits (ESP32 NVS)
///
/// Tags shorter than [`MIN_TAG_LEN`] characters are rejected.
pub fn hashed_key(tag: &str) -> StorageResult<String> {
    if tag.chars().count() < MIN_TAG_LEN {
        return Err(StorageError::InvalidTag(tag.to_string()));
    }
    Ok(format!(
        "{:0width$}",
        crc32fast::hash(tag.as_bytes()),
        width = HASHED_KEY_LEN
    ))
}
