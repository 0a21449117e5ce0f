//! # Tipset — Per-Event Advancement Tracking
//!
//! A tipset is the per-event vector of the highest generation known, by
//! creator, in that event's ancestry. Comparing two tipsets yields an
//! advancement score used to pick other-parents and to gauge sync progress
//! (spec.md §3, §4.2).

pub mod tipset;
pub mod tracker;

pub use tipset::{advancement_score, Tipset};
pub use tracker::TipsetTracker;
