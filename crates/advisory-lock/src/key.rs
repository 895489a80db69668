//! Lock key derivation
//!
//! PostgreSQL keys advisory locks on a pair of `int4` values. Lock names are
//! hashed with SHA-256 and two little-endian `i32`s are read from the digest,
//! at byte offsets 0 and 1. The overlapping read is deliberate: keys derived by
//! other processes sharing the same lock table must match bit for bit.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The integer pair identifying one advisory lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockKey {
    /// First half of the key
    pub k1: i32,
    /// Second half of the key
    pub k2: i32,
}

impl LockKey {
    /// Create a key from an already derived pair
    #[must_use]
    pub const fn new(k1: i32, k2: i32) -> Self {
        Self { k1, k2 }
    }

    /// Derive a key from a lock name
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let (k1, k2) = derive_key(name);
        Self { k1, k2 }
    }
}

/// Derive the advisory lock key pair for `name`.
///
/// Pure and deterministic. Collisions between distinct names are possible and
/// are not detected.
#[must_use]
pub fn derive_key(name: &str) -> (i32, i32) {
    let digest = Sha256::digest(name.as_bytes());
    (read_i32_le(&digest, 0), read_i32_le(&digest, 1))
}

fn read_i32_le(bytes: &[u8], offset: usize) -> i32 {
    let mut word = [0_u8; 4];
    word.copy_from_slice(&bytes[offset..offset + 4]);
    i32::from_le_bytes(word)
}

impl From<&str> for LockKey {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}

impl From<&String> for LockKey {
    fn from(name: &String) -> Self {
        Self::from_name(name)
    }
}

impl From<String> for LockKey {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl From<(i32, i32)> for LockKey {
    fn from((k1, k2): (i32, i32)) -> Self {
        Self { k1, k2 }
    }
}

impl From<LockKey> for (i32, i32) {
    fn from(key: LockKey) -> Self {
        (key.k1, key.k2)
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.k1, self.k2)
    }
}
