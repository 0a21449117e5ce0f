//! # Shadow Graph — In-Memory Event Index
//!
//! Thread-safe index of the currently non-ancient portion of the event DAG
//! (spec.md §4.3). Fine-grained locking: inserts, reads, and window
//! reservations proceed concurrently; only `advance_ancient_threshold`
//! takes an exclusive section, bounded by the number of evicted events.

pub mod graph;
pub mod reservation;

pub use graph::{InsertOutcome, ShadowGraph};
pub use reservation::Reservation;
