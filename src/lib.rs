//! # Bloomkit
//!
//! A Bloom filter library for byte-sequence elements, sized from an expected
//! element count and a target false-positive probability, with pluggable
//! hash families ("default", "optimal", "secure"), duplicate-detecting
//! insertion, filter union and binary persistence.

pub mod bitset;
pub mod codec;
pub mod filter;
pub mod hash;

pub use bitset::BitArray;
pub use filter::{BloomFilter, Config};
pub use hash::{HashFactory, HashFunction, HASHER_DEFAULT, HASHER_OPTIMAL, HASHER_SECURE};

/// Common error types for the library
#[derive(Debug, Clone, PartialEq)]
pub enum BloomError {
    InvalidConfig(String),
    UnknownHasher(String),
    RegistryFrozen(String),
    IncompatibleUnion(String),
    UnionTypeMismatch,
    Encode(String),
    Decode(String),
}

impl std::fmt::Display for BloomError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            BloomError::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
            BloomError::UnknownHasher(name) => write!(f, "Unknown hash strategy: {}", name),
            BloomError::RegistryFrozen(name) => write!(
                f,
                "Hash registry is frozen, cannot register strategy: {}",
                name
            ),
            BloomError::IncompatibleUnion(msg) => write!(f, "Incompatible union: {}", msg),
            BloomError::UnionTypeMismatch => write!(f, "Union with an unexpected filter type"),
            BloomError::Encode(msg) => write!(f, "Encode error: {}", msg),
            BloomError::Decode(msg) => write!(f, "Decode error: {}", msg),
        }
    }
}

impl std::error::Error for BloomError {}

pub type Result<T> = std::result::Result<T, BloomError>;
