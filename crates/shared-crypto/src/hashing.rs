//! # Pluggable Hashing
//!
//! SHA-384 default, 48-byte output, matching `shared_types::Hash`.
//!
//! Reference: spec.md §4.1 ("collision-resistant, 384-bit by default;
//! pluggable").

use sha2::{Digest, Sha384};
use shared_types::Hash;

/// A collision-resistant hash function producing a [`Hash`].
///
/// Implementations must be deterministic and `Send + Sync` so a single
/// instance can be shared across the hashing thread pool (spec.md §9,
/// "a small dedicated thread pool for hashing and signature verification").
pub trait Hasher: Send + Sync {
    fn hash(&self, bytes: &[u8]) -> Hash;

    /// Hash the concatenation of several field buffers without allocating
    /// an intermediate `Vec` — used for event hashing, which covers many
    /// discontiguous fields (spec.md §4.1: "the hash covers all fields
    /// except the signature and any derived metadata").
    fn hash_many(&self, parts: &[&[u8]]) -> Hash;
}

/// Default hasher: SHA-384, 48-byte digest.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha384Hasher;

impl Hasher for Sha384Hasher {
    fn hash(&self, bytes: &[u8]) -> Hash {
        self.hash_many(&[bytes])
    }

    fn hash_many(&self, parts: &[&[u8]]) -> Hash {
        let mut hasher = Sha384::new();
        for part in parts {
            hasher.update(part);
        }
        let digest = hasher.finalize();
        let mut out = [0u8; 48];
        out.copy_from_slice(&digest);
        Hash::from_bytes(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let h = Sha384Hasher;
        assert_eq!(h.hash(b"abc"), h.hash(b"abc"));
    }

    #[test]
    fn different_inputs_differ() {
        let h = Sha384Hasher;
        assert_ne!(h.hash(b"abc"), h.hash(b"abd"));
    }

    #[test]
    fn hash_many_matches_concatenated_hash() {
        let h = Sha384Hasher;
        let combined = h.hash(b"foobar");
        let split = h.hash_many(&[b"foo", b"bar"]);
        assert_eq!(combined, split);
    }
}
