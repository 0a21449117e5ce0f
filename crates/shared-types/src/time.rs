//! Monotonic per-creator timestamps.
//!
//! Reference: spec.md §3 (Event invariants — "p.timestamp is strictly before
//! e.timestamp by at least (number of transactions in p) nanoseconds").

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u128);

impl Timestamp {
    pub fn from_nanos(nanos: u128) -> Self {
        Self(nanos)
    }

    pub fn as_nanos(&self) -> u128 {
        self.0
    }

    /// Current wall-clock time. Callers that need deterministic behavior
    /// (event creation, tests) should go through a `TimeSource` trait
    /// instead of calling this directly.
    pub fn now() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before Unix epoch")
            .as_nanos();
        Self(nanos)
    }

    /// This timestamp plus `n` nanoseconds, one per transaction consumed
    /// from the creator's timestamp budget.
    pub fn plus_nanos(&self, n: u128) -> Self {
        Self(self.0 + n)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// A source of monotonic time, injectable for deterministic tests.
///
/// Mirrors the `TimeSource`/`SystemTimeSource` split used for consensus
/// timestamp validation in this codebase's other subsystems.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Real wall-clock time source.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}
