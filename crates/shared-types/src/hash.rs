//! Collision-resistant hash newtype.
//!
//! Reference: spec.md §3 (Event), §6 (Event wire format — "hash (48 bytes
//! SHA-384 default)").

use serde::{Deserialize, Serialize};
use std::fmt;

/// Length in bytes of the default hash (SHA-384).
pub const HASH_LEN: usize = 48;

/// A collision-resistant digest. 384 bits by default; the algorithm that
/// produced it is pluggable (see `shared-crypto::hashing::Hasher`), but the
/// wire size is fixed at [`HASH_LEN`] bytes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    /// The all-zero hash, used as a sentinel for "no parent".
    pub const ZERO: Hash = Hash([0u8; HASH_LEN]);

    pub fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_LEN]
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", hex_prefix(&self.0))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex_prefix(&self.0))
    }
}

fn hex_prefix(bytes: &[u8]) -> String {
    bytes
        .iter()
        .take(8)
        .map(|b| format!("{b:02x}"))
        .collect::<String>()
}
