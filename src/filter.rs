//! Bloom filter over a byte-sequence universe.
//!
//! A filter is sized from an expected element count and a target
//! false-positive probability, and probes its bit array through a named
//! hash family. Bits are never cleared, so a previously added element can
//! never test negative.

use std::any::Any;

use serde::{Deserialize, Serialize};

use crate::bitset::BitArray;
use crate::hash::{self, HashFunction};
use crate::{BloomError, Result};

/// Construction parameters for a Bloom filter.
///
/// Immutable once a filter is built from it; it rides along in the
/// serialized form so a reconstructed filter keeps the same provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Expected number of elements.
    pub n: u64,
    /// Target false-positive probability, in (0, 1).
    pub p: f64,
    /// Registered hash strategy name.
    pub hash_name: String,
}

impl Config {
    /// Convenience constructor.
    pub fn new(n: u64, p: f64, hash_name: impl Into<String>) -> Self {
        Config {
            n,
            p,
            hash_name: hash_name.into(),
        }
    }
}

/// Bit array length for `n` expected elements at false-positive rate `p`:
/// m = ceil(n * ln(1/p) / ln(2)^2).
pub fn optimal_m(n: u64, p: f64) -> usize {
    let ln2_squared = std::f64::consts::LN_2 * std::f64::consts::LN_2;
    ((n as f64) * (1.0 / p).ln() / ln2_squared).ceil() as usize
}

/// Hash count for `m` bits and `n` expected elements:
/// k = max(1, round((m/n) * ln 2)).
pub fn optimal_k(m: usize, n: u64) -> usize {
    let k = ((m as f64 / n as f64) * std::f64::consts::LN_2).round() as usize;
    k.max(1)
}

/// A Bloom filter: one fixed-size bit array probed by one hash family.
pub struct BloomFilter {
    bits: BitArray,
    m: usize,
    k: usize,
    hashers: Vec<Box<dyn HashFunction>>,
    cfg: Config,
}

impl BloomFilter {
    /// Build a filter from a config.
    ///
    /// Derives m and k, allocates the zeroed bit array and instantiates the
    /// named hash family. Fails if `cfg.n` is zero, `cfg.p` is outside
    /// (0, 1), or `cfg.hash_name` is not registered.
    pub fn new(cfg: Config) -> Result<Self> {
        if cfg.n == 0 {
            return Err(BloomError::InvalidConfig(
                "expected element count must be > 0".to_string(),
            ));
        }
        if !(cfg.p > 0.0 && cfg.p < 1.0) {
            return Err(BloomError::InvalidConfig(format!(
                "false-positive probability must be in (0, 1), got {}",
                cfg.p
            )));
        }

        let m = optimal_m(cfg.n, cfg.p);
        let k = optimal_k(m, cfg.n);
        let hashers = hash::create_family(&cfg.hash_name, k)?;
        if hashers.is_empty() {
            return Err(BloomError::InvalidConfig(format!(
                "hash family {} produced no functions for k={}",
                cfg.hash_name, k
            )));
        }

        Ok(BloomFilter {
            bits: BitArray::new(m),
            m,
            k,
            hashers,
            cfg,
        })
    }

    /// Reassemble a filter from already-validated parts (deserialization).
    pub(crate) fn from_parts(
        bits: BitArray,
        m: usize,
        k: usize,
        hashers: Vec<Box<dyn HashFunction>>,
        cfg: Config,
    ) -> Self {
        BloomFilter {
            bits,
            m,
            k,
            hashers,
            cfg,
        }
    }

    /// Add an element: sets every probed bit. Always succeeds.
    pub fn add(&mut self, elem: &[u8]) {
        let m = self.m as u64;
        for hasher in &self.hashers {
            let (_, indices) = hasher.hash(elem);
            for index in indices {
                self.bits.set((index % m) as usize);
            }
        }
    }

    /// Test membership. False means definitely absent; true means possibly
    /// present. Stops at the first unset bit.
    pub fn check(&self, elem: &[u8]) -> bool {
        let m = self.m as u64;
        for hasher in &self.hashers {
            let (_, indices) = hasher.hash(elem);
            for index in indices {
                if !self.bits.is_set((index % m) as usize) {
                    return false;
                }
            }
        }
        true
    }

    /// Membership test that also returns the primary digest.
    ///
    /// The digest comes from the family's first hash function and is
    /// returned whether or not the element is present, so callers get a
    /// stable per-element identifier even for absent elements.
    pub fn check_with_return(&self, elem: &[u8]) -> (Vec<u8>, bool) {
        let m = self.m as u64;

        let (primary, indices) = self.hashers[0].hash(elem);
        for index in indices {
            if !self.bits.is_set((index % m) as usize) {
                return (primary, false);
            }
        }
        for hasher in &self.hashers[1..] {
            let (_, indices) = hasher.hash(elem);
            for index in indices {
                if !self.bits.is_set((index % m) as usize) {
                    return (primary, false);
                }
            }
        }
        (primary, true)
    }

    /// Add an element only where its bits are not already set.
    ///
    /// Returns the primary digest and whether at least one bit was newly
    /// set; false means every probed bit was already set before the call.
    /// Walks all k hash functions even after finding an unset bit, so that
    /// an element partially covered by other elements' bits still ends up
    /// fully inserted. Not equivalent to check-then-add.
    pub fn add_or_eject(&mut self, elem: &[u8]) -> (Vec<u8>, bool) {
        let m = self.m as u64;
        let mut was_added = false;

        let (primary, indices) = self.hashers[0].hash(elem);
        for index in indices {
            let i = (index % m) as usize;
            if !self.bits.is_set(i) {
                was_added = true;
                self.bits.set(i);
            }
        }
        for hasher in &self.hashers[1..] {
            let (_, indices) = hasher.hash(elem);
            for index in indices {
                let i = (index % m) as usize;
                if !self.bits.is_set(i) {
                    was_added = true;
                    self.bits.set(i);
                }
            }
        }
        (primary, was_added)
    }

    /// Union another filter into this one, in place.
    ///
    /// `other` must be a `BloomFilter` with identical m, k and hash name;
    /// anything else fails and leaves this filter untouched (its current
    /// `capacity()` still reads as before). On success, returns the
    /// resulting fill ratio.
    pub fn union(&mut self, other: &dyn Any) -> Result<f64> {
        let other = other
            .downcast_ref::<BloomFilter>()
            .ok_or(BloomError::UnionTypeMismatch)?;

        if self.m != other.m {
            return Err(BloomError::IncompatibleUnion(format!(
                "m1({}) != m2({})",
                self.m, other.m
            )));
        }
        if self.k != other.k {
            return Err(BloomError::IncompatibleUnion(format!(
                "k1({}) != k2({})",
                self.k, other.k
            )));
        }
        if self.cfg.hash_name != other.cfg.hash_name {
            return Err(BloomError::IncompatibleUnion(format!(
                "different hashers: {} is not {}",
                other.cfg.hash_name, self.cfg.hash_name
            )));
        }

        self.bits.union_with(&other.bits);
        Ok(self.capacity())
    }

    /// Fill ratio: set bits over total bits. A heuristic that correlates
    /// with, but is not equal to, the actual false-positive rate.
    pub fn capacity(&self) -> f64 {
        self.bits.count() as f64 / self.m as f64
    }

    /// Number of bits in the filter.
    pub fn num_bits(&self) -> usize {
        self.m
    }

    /// Number of hash functions derived from the config.
    ///
    /// This is the derived k; the instantiated family may hold fewer
    /// functions (the "default" list caps at its length) or a single
    /// synthesizing function ("optimal").
    pub fn num_hashes(&self) -> usize {
        self.k
    }

    /// Strategy name of the hash family.
    pub fn hash_name(&self) -> &str {
        &self.cfg.hash_name
    }

    /// The config this filter was built from.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub(crate) fn bit_array(&self) -> &BitArray {
        &self.bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{HASHER_DEFAULT, HASHER_OPTIMAL, HASHER_SECURE};

    #[test]
    fn test_sizing_derivation() {
        // n=100, p=0.001: m = ceil(100 * ln(1000) / ln(2)^2) = 1438, k = 10
        let m = optimal_m(100, 0.001);
        assert_eq!(m, 1438);
        assert_eq!(optimal_k(m, 100), 10);

        // k never drops below 1 even for absurdly small m/n ratios
        assert_eq!(optimal_k(1, 1_000_000), 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            BloomFilter::new(Config::new(0, 0.01, HASHER_DEFAULT)),
            Err(BloomError::InvalidConfig(_))
        ));
        assert!(matches!(
            BloomFilter::new(Config::new(100, 0.0, HASHER_DEFAULT)),
            Err(BloomError::InvalidConfig(_))
        ));
        assert!(matches!(
            BloomFilter::new(Config::new(100, 1.0, HASHER_DEFAULT)),
            Err(BloomError::InvalidConfig(_))
        ));
        assert!(matches!(
            BloomFilter::new(Config::new(100, f64::NAN, HASHER_DEFAULT)),
            Err(BloomError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_unknown_hasher_rejected() {
        let err = BloomFilter::new(Config::new(100, 0.01, "bogus")).err().unwrap();
        assert_eq!(err, BloomError::UnknownHasher("bogus".to_string()));
    }

    #[test]
    fn test_add_then_check_optimal() {
        let mut filter = BloomFilter::new(Config::new(100, 0.001, HASHER_OPTIMAL)).unwrap();

        filter.add(&[1, 2, 3]);
        assert!(filter.check(&[1, 2, 3]));
        assert!(!filter.check(&[1, 2, 4]));
    }

    #[test]
    fn test_no_false_negatives() {
        use rand::{rngs::StdRng, RngCore, SeedableRng};

        for name in [HASHER_DEFAULT, HASHER_OPTIMAL, HASHER_SECURE] {
            let mut filter = BloomFilter::new(Config::new(500, 0.01, name)).unwrap();
            let mut rng = StdRng::seed_from_u64(7);

            let elems: Vec<[u8; 16]> = (0..500)
                .map(|_| {
                    let mut buf = [0u8; 16];
                    rng.fill_bytes(&mut buf);
                    buf
                })
                .collect();

            for elem in &elems {
                filter.add(elem);
            }
            for elem in &elems {
                assert!(filter.check(elem), "false negative under {}", name);
            }
        }
    }

    #[test]
    fn test_check_with_return_digest_is_stable() {
        let mut filter = BloomFilter::new(Config::new(100, 0.01, HASHER_DEFAULT)).unwrap();

        let (absent_digest, present) = filter.check_with_return(b"elem");
        assert!(!present);
        assert!(!absent_digest.is_empty());

        filter.add(b"elem");
        let (present_digest, present) = filter.check_with_return(b"elem");
        assert!(present);
        // The primary digest does not depend on membership
        assert_eq!(absent_digest, present_digest);
    }

    #[test]
    fn test_add_or_eject_detects_duplicates() {
        let mut filter = BloomFilter::new(Config::new(100, 0.001, HASHER_OPTIMAL)).unwrap();

        let (first_digest, was_added) = filter.add_or_eject(b"elem");
        assert!(was_added);

        let (second_digest, was_added) = filter.add_or_eject(b"elem");
        assert!(!was_added);
        assert_eq!(first_digest, second_digest);

        let (check_digest, present) = filter.check_with_return(b"elem");
        assert!(present);
        assert_eq!(check_digest, first_digest);
    }

    #[test]
    fn test_add_or_eject_completes_partial_footprints() {
        let mut filter = BloomFilter::new(Config::new(100, 0.001, HASHER_DEFAULT)).unwrap();

        // Pre-set some of the element's bits through a different element,
        // then insert: the exhaustive pass must still set every bit so a
        // plain check succeeds afterwards.
        filter.add(b"overlap source");
        let (_, was_added) = filter.add_or_eject(b"target");
        assert!(was_added);
        assert!(filter.check(b"target"));
    }

    #[test]
    fn test_union_merges_members() {
        let cfg = Config::new(100, 0.001, HASHER_DEFAULT);
        let mut a = BloomFilter::new(cfg.clone()).unwrap();
        let b = {
            let mut b = BloomFilter::new(cfg).unwrap();
            b.add(&[1, 2, 3]);
            b
        };

        assert!(!a.check(&[1, 2, 3]));
        let fill = a.union(&b).unwrap();
        assert!(fill > 0.0);
        assert!(a.check(&[1, 2, 3]));
    }

    #[test]
    fn test_union_rejects_mismatched_size() {
        let mut a = BloomFilter::new(Config::new(100, 0.001, HASHER_DEFAULT)).unwrap();
        let b = BloomFilter::new(Config::new(200, 0.001, HASHER_DEFAULT)).unwrap();
        a.add(b"resident");

        let before = a.bit_array().clone();
        assert!(matches!(a.union(&b), Err(BloomError::IncompatibleUnion(_))));
        // Receiver untouched by the failed attempt
        assert_eq!(*a.bit_array(), before);
        assert!(a.check(b"resident"));
    }

    #[test]
    fn test_union_rejects_mismatched_hasher() {
        // Same n and p, so identical m and k; only the strategy differs.
        let mut a = BloomFilter::new(Config::new(100, 0.001, HASHER_DEFAULT)).unwrap();
        let b = BloomFilter::new(Config::new(100, 0.001, HASHER_SECURE)).unwrap();

        let before = a.bit_array().clone();
        assert!(matches!(a.union(&b), Err(BloomError::IncompatibleUnion(_))));
        assert_eq!(*a.bit_array(), before);
    }

    #[test]
    fn test_union_rejects_foreign_types() {
        let mut a = BloomFilter::new(Config::new(100, 0.001, HASHER_DEFAULT)).unwrap();
        let not_a_filter = String::from("not a filter");

        let before = a.bit_array().clone();
        assert_eq!(a.union(&not_a_filter), Err(BloomError::UnionTypeMismatch));
        assert_eq!(*a.bit_array(), before);
    }

    #[test]
    fn test_capacity_is_monotonic() {
        let cfg = Config::new(200, 0.01, HASHER_DEFAULT);
        let mut filter = BloomFilter::new(cfg.clone()).unwrap();
        let mut previous = filter.capacity();
        assert_eq!(previous, 0.0);

        for i in 0u32..50 {
            filter.add(&i.to_le_bytes());
            let fill = filter.capacity();
            assert!(fill >= previous);
            previous = fill;
        }

        filter.add_or_eject(b"one more");
        assert!(filter.capacity() >= previous);
        previous = filter.capacity();

        let mut other = BloomFilter::new(cfg).unwrap();
        other.add(b"from the other side");
        filter.union(&other).unwrap();
        assert!(filter.capacity() >= previous);
    }
}
