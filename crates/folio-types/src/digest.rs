use std::fmt;

use serde::{Deserialize, Serialize};

/// BLAKE3 digest of a piece of document content.
///
/// Identical content always produces the same `Digest`, which is what makes
/// duplicate submissions detectable and ETags comparable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Wrap a pre-computed hash.
    pub fn from_hash(hash: [u8; 32]) -> Self {
        Self(hash)
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Hex of the first `n` bytes, used for compact section hashes.
    pub fn prefix_hex(&self, n: usize) -> String {
        hex::encode(&self.0[..n.min(32)])
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        self.prefix_hex(4)
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
