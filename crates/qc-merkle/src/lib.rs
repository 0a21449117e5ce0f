//! # Merkle Tree Model & Reservations (spec.md §4.7)
//!
//! Node/leaf abstraction with reservation counts, an immutability flag, and
//! custom-reconnect delegation, plus the leaf-only [`virtual_map`] variant
//! used by huge state sub-trees. `qc-traversal` and `qc-reconnect` build on
//! the types defined here; `qc-state-manager` holds [`tree::MerkleTree`]s
//! inside its signed states.

pub mod error;
pub mod node;
pub mod tree;
pub mod virtual_map;

pub use error::MerkleError;
pub use node::MerkleNode;
pub use tree::MerkleTree;
pub use virtual_map::{DataSource, LeafRange, VirtualMap};

#[cfg(any(test, feature = "test-util"))]
pub use virtual_map::test_support;
