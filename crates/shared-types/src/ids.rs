//! Node identity within a roster.
//!
//! Reference: spec.md §3 (Roster), GLOSSARY ("Roster"). Unlike a DHT-style
//! 256-bit `NodeId` derived from a public-key hash, the roster here is a
//! small, fixed membership list (tens of nodes), so a node's identity is its
//! dense index into that list; see DESIGN.md for the rationale.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a node within the current roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
