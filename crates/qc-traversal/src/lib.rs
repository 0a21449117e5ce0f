//! # Two-Phase Pessimistic Traversal Policy (spec.md §4.9)
//!
//! Walks a virtual map's leaf-parent rank in fixed-size chunks before ever
//! touching a leaf, so a subtree with no dirty leaves costs roughly one
//! request per leaf-parent position instead of one per leaf. `qc-reconnect`
//! drives one [`TraversalPolicy`] per subtree whose root advertises a
//! custom reconnect view.

pub mod error;
pub mod phase1;
pub mod phase2;
pub mod plan;
pub mod policy;

pub use error::TraversalError;
pub use phase1::Phase1;
pub use phase2::Phase2;
pub use plan::{Chunk, TraversalPlan};
pub use policy::{Request, TraversalPolicy};
