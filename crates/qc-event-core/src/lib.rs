//! # Event Core — Event Model & Hashing
//!
//! The event data model, parent linkage, and wire encoding underlying the
//! rest of the hashgraph core (spec.md §4.1). Every other domain crate
//! (`qc-tipset`, `qc-shadow-graph`, `qc-gossip`, ...) builds on the
//! [`Event`] and [`EventDescriptor`] types defined here.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod event;
pub mod wire;

pub use config::EventLimits;
pub use descriptor::EventDescriptor;
pub use error::{EventError, VerifyOutcome};
pub use event::{build_event, recompute_hash, sign, verify, Event};
