//! Binary persistence for Bloom filters.
//!
//! The payload carries the raw bit contents, m, k, the hash strategy name
//! and the original config, never the hash functions themselves. On load
//! the family is rebuilt from the registry, which only works because every
//! registered hash function is pure and deterministic.

use serde::{Deserialize, Serialize};

use crate::bitset::BitArray;
use crate::filter::{BloomFilter, Config};
use crate::hash;
use crate::{BloomError, Result};

/// Wire form of a filter.
#[derive(Serialize, Deserialize)]
struct SerializedFilter {
    bits: Vec<u8>,
    m: u64,
    k: u64,
    hash_name: String,
    cfg: Config,
}

/// Encode a filter into a self-contained binary payload.
pub fn serialize(filter: &BloomFilter) -> Result<Vec<u8>> {
    let raw = SerializedFilter {
        bits: filter.bit_array().to_bytes(),
        m: filter.num_bits() as u64,
        k: filter.num_hashes() as u64,
        hash_name: filter.hash_name().to_string(),
        cfg: filter.config().clone(),
    };
    bincode::serialize(&raw).map_err(|e| BloomError::Encode(e.to_string()))
}

/// Decode a payload produced by [`serialize`] into a new, independently
/// owned filter.
///
/// The hash family is re-derived from the recorded strategy name and k.
/// Fails on malformed or truncated bytes, on a bit payload whose length
/// disagrees with m, and on an unregistered strategy name.
pub fn deserialize(data: &[u8]) -> Result<BloomFilter> {
    let raw: SerializedFilter =
        bincode::deserialize(data).map_err(|e| BloomError::Decode(e.to_string()))?;

    let m = raw.m as usize;
    let k = raw.k as usize;
    if raw.bits.len() != m.div_ceil(8) {
        return Err(BloomError::Decode(format!(
            "bit payload holds {} bytes, want {} for m={}",
            raw.bits.len(),
            m.div_ceil(8),
            m
        )));
    }

    let hashers = hash::create_family(&raw.hash_name, k)?;
    if hashers.is_empty() {
        return Err(BloomError::Decode(format!(
            "hash family {} produced no functions for k={}",
            raw.hash_name, k
        )));
    }
    let bits = BitArray::from_bytes(&raw.bits, m);
    Ok(BloomFilter::from_parts(bits, m, k, hashers, raw.cfg))
}

impl BloomFilter {
    /// Shorthand for [`serialize`].
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    /// Shorthand for [`deserialize`].
    pub fn from_bytes(data: &[u8]) -> Result<BloomFilter> {
        deserialize(data)
    }
}
