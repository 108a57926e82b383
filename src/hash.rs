//! Hash families for Bloom filters.
//!
//! Every hash function maps an arbitrary byte sequence to a raw digest plus
//! a sequence of candidate bit indices. Hash families are looked up by name
//! in a process-wide registry so that a filter can be rebuilt from its
//! strategy name alone after deserialization.

use std::collections::HashMap;
use std::hash::Hasher;
use std::marker::PhantomData;
use std::sync::{Mutex, OnceLock};

use crc::{Crc, CRC_64_XZ};
use fnv::FnvHasher;
use md5::{Digest, Md5};
use sha1::Sha1;
use sha3::Keccak256;

use crate::{BloomError, Result};

/// Strategy name for the fixed list of general-purpose digests.
pub const HASHER_DEFAULT: &str = "default";
/// Strategy name for the single double-hashing function.
pub const HASHER_OPTIMAL: &str = "optimal";
/// Strategy name for the default list with Keccak-256 prepended.
pub const HASHER_SECURE: &str = "secure";

/// Trait for hash functions used in Bloom filters.
///
/// Implementations must be pure: the same input always yields a
/// byte-identical digest and identical indices, across calls and across
/// process restarts. This is what makes serialized filters reconstructible
/// from their strategy name.
pub trait HashFunction: Send + Sync {
    /// Digest `elem` and derive its candidate bit indices.
    ///
    /// Returns the raw digest bytes and at least one index word. Indices are
    /// not reduced modulo the filter size; the filter layer does that.
    fn hash(&self, elem: &[u8]) -> (Vec<u8>, Vec<u64>);
}

/// A factory producing an ordered hash family for a given hash count `k`.
pub type HashFactory = Box<dyn Fn(usize) -> Vec<Box<dyn HashFunction>> + Send + Sync>;

/// Split a raw digest into consecutive 8-byte little-endian words.
///
/// Trailing bytes short of a full word are ignored, so a 20-byte SHA-1
/// digest yields two words.
fn le_words(digest: &[u8]) -> Vec<u64> {
    digest
        .chunks_exact(8)
        .map(|word| u64::from_le_bytes(word.try_into().unwrap()))
        .collect()
}

/// Hash function backed by any one-shot digest algorithm.
struct DigestHash<D>(PhantomData<fn() -> D>);

impl<D> DigestHash<D> {
    const fn new() -> Self {
        DigestHash(PhantomData)
    }
}

impl<D: Digest> HashFunction for DigestHash<D> {
    fn hash(&self, elem: &[u8]) -> (Vec<u8>, Vec<u64>) {
        let digest = D::digest(elem).to_vec();
        let indices = le_words(&digest);
        (digest, indices)
    }
}

const CRC64_ECMA: Crc<u64> = Crc::<u64>::new(&CRC_64_XZ);

/// CRC-64 with the ECMA polynomial; an 8-byte digest and a single index.
struct Crc64Hash;

impl HashFunction for Crc64Hash {
    fn hash(&self, elem: &[u8]) -> (Vec<u8>, Vec<u64>) {
        let digest = CRC64_ECMA.checksum(elem).to_be_bytes().to_vec();
        let indices = le_words(&digest);
        (digest, indices)
    }
}

/// FNV-1a, 64-bit variant.
struct Fnv64Hash;

impl HashFunction for Fnv64Hash {
    fn hash(&self, elem: &[u8]) -> (Vec<u8>, Vec<u64>) {
        let mut hasher = FnvHasher::default();
        hasher.write(elem);
        let digest = hasher.finish().to_be_bytes().to_vec();
        let indices = le_words(&digest);
        (digest, indices)
    }
}

const FNV128_OFFSET: u128 = 0x6c62272e07bb014262b821756295c58d;
const FNV128_PRIME: u128 = 0x0000000001000000000000000000013b;

/// FNV-1a, 128-bit variant. No maintained crate ships this width, so it is
/// computed directly over u128.
fn fnv1a_128(data: &[u8]) -> u128 {
    let mut hash = FNV128_OFFSET;
    for &byte in data {
        hash ^= byte as u128;
        hash = hash.wrapping_mul(FNV128_PRIME);
    }
    hash
}

struct Fnv128Hash;

impl HashFunction for Fnv128Hash {
    fn hash(&self, elem: &[u8]) -> (Vec<u8>, Vec<u64>) {
        let digest = fnv1a_128(elem).to_be_bytes().to_vec();
        let indices = le_words(&digest);
        (digest, indices)
    }
}

/// Double-hashing function used by the "optimal" strategy.
///
/// One 128-bit digest is split into two words h0 and h1, and the k indices
/// are synthesized as h0 + i * h1. This trades k independent digest passes
/// for a single one (the Kirsch-Mitzenmacher construction).
struct OptimalHash {
    k: usize,
}

impl HashFunction for OptimalHash {
    fn hash(&self, elem: &[u8]) -> (Vec<u8>, Vec<u64>) {
        let digest = fnv1a_128(elem).to_be_bytes().to_vec();
        let words = le_words(&digest);
        let (h0, h1) = (words[0], words[1]);
        let indices = (0..self.k as u64)
            .map(|i| h0.wrapping_add(i.wrapping_mul(h1)))
            .collect();
        (digest, indices)
    }
}

/// The fixed ordered list behind the "default" strategy.
fn default_hashers() -> Vec<Box<dyn HashFunction>> {
    vec![
        Box::new(DigestHash::<Md5>::new()),
        Box::new(Crc64Hash),
        Box::new(DigestHash::<Sha1>::new()),
        Box::new(Fnv64Hash),
        Box::new(Fnv128Hash),
    ]
}

fn default_family(k: usize) -> Vec<Box<dyn HashFunction>> {
    // k beyond the list length is capped, never padded
    let mut hashers = default_hashers();
    hashers.truncate(k);
    hashers
}

fn secure_family(k: usize) -> Vec<Box<dyn HashFunction>> {
    let mut hashers: Vec<Box<dyn HashFunction>> = vec![Box::new(DigestHash::<Keccak256>::new())];
    hashers.extend(default_hashers());
    hashers.truncate(k);
    hashers
}

fn optimal_family(k: usize) -> Vec<Box<dyn HashFunction>> {
    vec![Box::new(OptimalHash { k })]
}

static REGISTRY: OnceLock<HashMap<String, HashFactory>> = OnceLock::new();
static PENDING: Mutex<Vec<(String, HashFactory)>> = Mutex::new(Vec::new());

/// Register a custom hash family factory under `name`.
///
/// Registration is only possible before the registry is first used, i.e.
/// before any filter is constructed or deserialized; afterwards the registry
/// is read-only and this returns an error. Registering one of the built-in
/// names replaces that built-in.
pub fn register_factory(name: impl Into<String>, factory: HashFactory) -> Result<()> {
    let name = name.into();
    if REGISTRY.get().is_some() {
        return Err(BloomError::RegistryFrozen(name));
    }
    let mut pending = PENDING.lock().unwrap();
    // Re-check under the lock so a registration racing the freeze is not
    // silently dropped.
    if REGISTRY.get().is_some() {
        return Err(BloomError::RegistryFrozen(name));
    }
    pending.push((name, factory));
    Ok(())
}

fn registry() -> &'static HashMap<String, HashFactory> {
    REGISTRY.get_or_init(|| {
        let mut map: HashMap<String, HashFactory> = HashMap::new();
        map.insert(HASHER_DEFAULT.to_string(), Box::new(default_family));
        map.insert(HASHER_OPTIMAL.to_string(), Box::new(optimal_family));
        map.insert(HASHER_SECURE.to_string(), Box::new(secure_family));
        for (name, factory) in PENDING.lock().unwrap().drain(..) {
            map.insert(name, factory);
        }
        map
    })
}

/// Build the hash family registered under `name` for hash count `k`.
///
/// Freezes the registry on first use. Fails if `name` is not registered.
pub fn create_family(name: &str, k: usize) -> Result<Vec<Box<dyn HashFunction>>> {
    match registry().get(name) {
        Some(factory) => Ok(factory(k)),
        None => Err(BloomError::UnknownHasher(name.to_string())),
    }
}
