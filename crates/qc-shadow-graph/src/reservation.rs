//! Window reservations, spec.md §4.3 `reserve_window`.

use std::sync::Arc;

use crate::graph::Inner;

/// Pins all non-ancient events at or above `lower_threshold` against
/// eviction for as long as this guard is held. Dropping it (including on
/// panic/early return, per spec.md §9 "scoped resources") allows eviction
/// of that range to resume.
pub struct Reservation {
    inner: Arc<Inner>,
    lower_threshold: u64,
    id: u64,
}

impl Reservation {
    pub(crate) fn new(inner: Arc<Inner>, lower_threshold: u64, id: u64) -> Self {
        Self {
            inner,
            lower_threshold,
            id,
        }
    }

    pub fn lower_threshold(&self) -> u64 {
        self.lower_threshold
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.inner.release_window(self.id);
    }
}
