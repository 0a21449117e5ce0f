//! Virtual Map: a leaf-only sub-tree whose storage is off-heap, spec.md §3
//! "Virtual Map". Internal nodes above the leaves are derived from leaf
//! paths, never materialized as [`crate::node::MerkleNode`] instances —
//! the [`crate::traversal`]-equivalent consumer (in `qc-traversal`) walks
//! paths arithmetically instead.

use shared_types::Hash;

use crate::error::MerkleError;

/// Narrow interface onto off-heap leaf storage (spec.md §1 "Persistent
/// storage engines ... consumed through a narrow `DataSource` interface").
/// A production node backs this with an on-disk virtual-map data file;
/// nothing in this crate depends on that representation.
pub trait DataSource: Send + Sync {
    /// The leaf's content hash at `path`, or `None` if `path` is outside
    /// the active range or has never been written.
    fn leaf_hash(&self, path: u64) -> Option<Hash>;

    /// The leaf's raw key/value payload at `path`.
    fn leaf_value(&self, path: u64) -> Option<(Vec<u8>, Vec<u8>)>;
}

/// First/last leaf path bounds for a virtual map (spec.md §3, §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafRange {
    pub first_leaf_path: u64,
    pub last_leaf_path: u64,
}

impl LeafRange {
    pub fn new(first_leaf_path: u64, last_leaf_path: u64) -> Self {
        Self {
            first_leaf_path,
            last_leaf_path,
        }
    }

    pub fn contains(&self, path: u64) -> bool {
        path >= self.first_leaf_path && path <= self.last_leaf_path
    }

    pub fn leaf_count(&self) -> u64 {
        self.last_leaf_path - self.first_leaf_path + 1
    }

    pub fn check(&self, path: u64) -> Result<(), MerkleError> {
        if self.contains(path) {
            Ok(())
        } else {
            Err(MerkleError::OutOfRange {
                path,
                first: self.first_leaf_path,
                last: self.last_leaf_path,
            })
        }
    }
}

/// A virtual map: leaf range plus the off-heap store backing it.
pub struct VirtualMap {
    range: LeafRange,
    data_source: Box<dyn DataSource>,
}

impl VirtualMap {
    pub fn new(range: LeafRange, data_source: Box<dyn DataSource>) -> Self {
        Self { range, data_source }
    }

    pub fn range(&self) -> LeafRange {
        self.range
    }

    pub fn leaf_hash(&self, path: u64) -> Result<Option<Hash>, MerkleError> {
        self.range.check(path)?;
        Ok(self.data_source.leaf_hash(path))
    }

    pub fn leaf_value(&self, path: u64) -> Result<Option<(Vec<u8>, Vec<u8>)>, MerkleError> {
        self.range.check(path)?;
        Ok(self.data_source.leaf_value(path))
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_support {
    use super::*;
    use std::collections::HashMap;

    /// In-memory `DataSource`, used by this crate's and `qc-traversal`'s
    /// tests in place of an on-disk virtual-map file. Gated behind the
    /// `test-util` feature so it never ships in a production binary.
    pub struct InMemoryDataSource {
        leaves: HashMap<u64, (Vec<u8>, Vec<u8>)>,
    }

    impl InMemoryDataSource {
        pub fn new(leaves: HashMap<u64, (Vec<u8>, Vec<u8>)>) -> Self {
            Self { leaves }
        }
    }

    impl DataSource for InMemoryDataSource {
        fn leaf_hash(&self, path: u64) -> Option<Hash> {
            use shared_crypto::{Hasher, Sha384Hasher};
            self.leaves
                .get(&path)
                .map(|(k, v)| Sha384Hasher.hash_many(&[k, v]))
        }

        fn leaf_value(&self, path: u64) -> Option<(Vec<u8>, Vec<u8>)> {
            self.leaves.get(&path).cloned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::InMemoryDataSource;
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn out_of_range_lookup_is_rejected() {
        let map = VirtualMap::new(
            LeafRange::new(1024, 2047),
            Box::new(InMemoryDataSource::new(HashMap::new())),
        );
        assert!(matches!(
            map.leaf_hash(10),
            Err(MerkleError::OutOfRange { .. })
        ));
    }

    #[test]
    fn in_range_missing_leaf_is_none() {
        let map = VirtualMap::new(
            LeafRange::new(1024, 2047),
            Box::new(InMemoryDataSource::new(HashMap::new())),
        );
        assert_eq!(map.leaf_hash(1500).unwrap(), None);
    }

    #[test]
    fn leaf_count_is_inclusive() {
        let range = LeafRange::new(1024, 2047);
        assert_eq!(range.leaf_count(), 1024);
    }
}
