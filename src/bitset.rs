//! Fixed-size bit array backing a Bloom filter.
//!
//! Thin wrapper over `bit_vec::BitVec` exposing only the operations the
//! filter layer needs: set, test, popcount and in-place union.

use bit_vec::BitVec;

/// A fixed-size array of bits, all zero on creation.
///
/// The size never changes after construction and bits only ever transition
/// from unset to set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitArray {
    bits: BitVec,
}

impl BitArray {
    /// Create a zero-filled bit array of `size` bits.
    pub fn new(size: usize) -> Self {
        BitArray {
            bits: BitVec::from_elem(size, false),
        }
    }

    /// Rebuild a bit array of `len` bits from its raw byte export.
    ///
    /// `bytes` must hold at least `len` bits; any trailing padding bits from
    /// the last byte are discarded.
    pub fn from_bytes(bytes: &[u8], len: usize) -> Self {
        let mut bits = BitVec::from_bytes(bytes);
        bits.truncate(len);
        BitArray { bits }
    }

    /// Set bit `i`. Idempotent: setting an already-set bit has no effect.
    pub fn set(&mut self, i: usize) {
        self.bits.set(i, true);
    }

    /// Test bit `i`. Out-of-range indices read as unset.
    pub fn is_set(&self, i: usize) -> bool {
        self.bits.get(i).unwrap_or(false)
    }

    /// Number of set bits.
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&bit| bit).count()
    }

    /// Number of bits in the array.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// True if the array holds no bits at all.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Bitwise OR of `other` into `self`, in place.
    ///
    /// Both arrays must have the same length; the filter layer checks this
    /// before calling.
    pub fn union_with(&mut self, other: &BitArray) {
        debug_assert_eq!(self.bits.len(), other.bits.len());
        for (i, bit) in other.bits.iter().enumerate() {
            if bit {
                self.bits.set(i, true);
            }
        }
    }

    /// Export the raw bit contents, most significant bit of each byte first.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.bits.to_bytes()
    }
}
