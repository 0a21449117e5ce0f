//! # Shared Types Crate
//!
//! Core data-model primitives shared across the hashgraph consensus
//! subsystems (event core, tipset tracker, shadow graph, gossip, reconnect,
//! signed-state manager).
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: cross-crate identifiers and the roster
//!   model live here, not duplicated per subsystem.
//! - **No process-wide singletons**: every type here is a plain value;
//!   construction-time wiring happens in `node-runtime`.

pub mod error;
pub mod hash;
pub mod ids;
pub mod roster;
pub mod time;

pub use error::{CoreError, CoreResult};
pub use hash::{Hash, HASH_LEN};
pub use ids::NodeId;
pub use roster::{Roster, RosterEntry, Weight};
pub use time::Timestamp;
