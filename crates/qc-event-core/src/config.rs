//! Event-core configuration, spec.md §4.1 "Transaction list size is bounded
//! (configurable)".

/// Limits enforced by [`crate::event::build_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventLimits {
    /// Maximum total size, in bytes, of an event's transaction payloads
    /// combined.
    pub max_transaction_bytes: usize,
}

impl Default for EventLimits {
    fn default() -> Self {
        Self {
            max_transaction_bytes: 6 * 1024 * 1024,
        }
    }
}
