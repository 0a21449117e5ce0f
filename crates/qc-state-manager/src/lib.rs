//! # Signed-State Manager & Garbage Collector (spec.md §4.10)
//!
//! Tracks one [`state::SignedState`] per round: stamps a freshly-submitted
//! Merkle root with its round and hash, collects weighted signatures
//! toward a completion threshold, and evicts rounds that fall outside a
//! sliding retention window. Reservations on a round's tree are named
//! (spec.md §4.10 "Reservation discipline") and released asynchronously
//! through a [`collector::GarbageCollector`] pump rather than inline on
//! drop, with a [`sentinel::LeakSentinel`] logging — never forcing —
//! reservations held past `state.sentinel_leak_ttl`.

pub mod collector;
pub mod config;
pub mod error;
pub mod manager;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod reservation;
pub mod sentinel;
pub mod state;
pub mod traits;

pub use collector::GarbageCollector;
pub use config::StateManagerConfig;
pub use error::StateManagerError;
pub use manager::SignedStateManager;
pub use reservation::{ReleaseTicket, ReservedSignedState};
pub use sentinel::LeakSentinel;
pub use state::SignedState;
pub use traits::{CompleteStateConsumer, NoopConsumer, NoopSink, StateSink};
