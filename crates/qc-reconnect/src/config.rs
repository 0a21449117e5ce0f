//! Reconnect configuration, spec.md §6 recognized options
//! (`reconnect.max_parallel_subtrees`, `reconnect.async_stream_timeout`,
//! `reconnect.async_stream_buffer_size`).

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Upper bound on concurrently open views (spec.md §4.8 "view
    /// scheduling"), independent of how many subtrees are pending.
    pub max_parallel_subtrees: usize,
    /// Per-poll deadline a learner waits for a teacher's reply before
    /// aborting (spec.md §9: fixes the `waitForConnection` bug — this is a
    /// real deadline enforced with `tokio::time::timeout`, not a
    /// same-instant comparison that can never fire).
    pub async_stream_timeout: Duration,
    /// Bound on in-flight outstanding requests per view before the learner
    /// must wait for responses (spec.md §6).
    pub async_stream_buffer_size: usize,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_parallel_subtrees: 8,
            async_stream_timeout: Duration::from_secs(10),
            async_stream_buffer_size: 256,
        }
    }
}
