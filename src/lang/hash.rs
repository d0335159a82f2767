//! 32-byte SHA-256 hash type.

use sha2::{Digest, Sha256};
use std::fmt;

pub const HASH_LEN: usize = 32;

/// SHA-256 digest. Contract addresses and storage roots are both hashes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Hash, Ord, PartialOrd)]
pub struct Hash(pub [u8; HASH_LEN]);

/// A contract address: the hash of its serialized bytecode.
pub type Address = Hash;

impl Hash {
    pub fn zero() -> Hash {
        Hash([0u8; HASH_LEN])
    }

    pub fn digest(data: &[u8]) -> Hash {
        Hash(Sha256::digest(data).into())
    }

    /// Creates an incremental SHA-256 builder.
    pub fn sha256() -> HashBuilder {
        HashBuilder::new()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn from_hex(s: &str) -> Option<Hash> {
        let mut bytes = [0u8; HASH_LEN];
        hex::decode_to_slice(s, &mut bytes).ok()?;
        Some(Hash(bytes))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Incremental SHA-256 builder.
pub struct HashBuilder {
    hasher: Sha256,
}

impl HashBuilder {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    pub fn finalize(self) -> Hash {
        Hash(self.hasher.finalize().into())
    }
}

impl Default for HashBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_matches_builder() {
        let mut h = Hash::sha256();
        h.update(b"te");
        h.update(b"st");
        assert_eq!(h.finalize(), Hash::digest(b"test"));
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            Hash::digest(b"").to_string(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hex_round_trip() {
        let h = Hash::digest(b"abc");
        assert_eq!(Hash::from_hex(&h.to_string()), Some(h));
        assert_eq!(Hash::from_hex("00"), None);
    }
}
