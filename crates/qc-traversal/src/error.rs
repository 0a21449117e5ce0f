//! Traversal error kinds (spec.md §7).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TraversalError {
    #[error("leaf range [{first}, {last}] is empty or inverted")]
    EmptyLeafRange { first: u64, last: u64 },

    #[error("path {path} does not belong to chunk {chunk}")]
    PathNotInChunk { path: u64, chunk: u32 },
}
