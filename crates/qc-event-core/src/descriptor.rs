//! Event Descriptor — spec.md §3: "Compact reference {hash, creator, birth
//! round, generation}; identity is the hash."

use std::hash::{Hash as StdHash, Hasher as StdHasher};

use serde::{Deserialize, Serialize};
use shared_types::{Hash, NodeId};

/// A compact reference to an event. Two descriptors with the same `hash`
/// are the same event even if other fields were populated independently;
/// equality and hashing are defined on `hash` alone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EventDescriptor {
    pub hash: Hash,
    pub creator: NodeId,
    pub birth_round: u64,
    pub generation: u64,
}

impl EventDescriptor {
    pub fn new(hash: Hash, creator: NodeId, birth_round: u64, generation: u64) -> Self {
        Self {
            hash,
            creator,
            birth_round,
            generation,
        }
    }
}

impl PartialEq for EventDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for EventDescriptor {}

impl StdHash for EventDescriptor {
    fn hash<H: StdHasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_hash_only() {
        let a = EventDescriptor::new(Hash::from_bytes([1u8; 48]), NodeId(1), 5, 9);
        let b = EventDescriptor::new(Hash::from_bytes([1u8; 48]), NodeId(2), 99, 0);
        assert_eq!(a, b, "descriptors with the same hash are the same event");
    }

    #[test]
    fn different_hash_is_different_identity() {
        let a = EventDescriptor::new(Hash::from_bytes([1u8; 48]), NodeId(1), 5, 9);
        let b = EventDescriptor::new(Hash::from_bytes([2u8; 48]), NodeId(1), 5, 9);
        assert_ne!(a, b);
    }
}
