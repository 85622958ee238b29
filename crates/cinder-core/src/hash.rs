//! Stable name hashing for cross-boundary resource lookups

use serde::{Deserialize, Serialize};
use std::fmt;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// A 64-bit FNV-1a hash of a resource name.
///
/// Effect prototypes store animation names as hashes and the embedding
/// application resolves the same hashes at runtime, so the algorithm is
/// part of the data contract and must never change.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameHash(pub u64);

impl NameHash {
    /// Hash a name string
    pub fn of(name: &str) -> Self {
        Self::from_bytes(name.as_bytes())
    }

    /// Hash raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hash = FNV_OFFSET_BASIS;
        for &byte in data {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        Self(hash)
    }

    /// Wrap a precomputed hash value
    pub fn from_raw(hash: u64) -> Self {
        Self(hash)
    }

    /// Get the raw u64 value
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for NameHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameHash({:#018x})", self.0)
    }
}

impl fmt::Display for NameHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
