//! # Sliding-Window Rate Limiter
//!
//! Generalizes the time-bounded window this codebase already used for
//! replay-nonce caching into a small per-key rate limiter: spec.md §4.6
//! calls for "`None` + rate-limited log on miss" when a peer's presented
//! certificate issuer does not match any roster entry. Rather than a
//! nonce-specific cache, this is keyed by whatever the caller wants to
//! throttle (peer id, cert fingerprint, ...).

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Allows at most `max_events` per key within a trailing `window`.
pub struct RateLimiter<K> {
    window: Duration,
    max_events: usize,
    events: HashMap<K, Vec<Instant>>,
}

impl<K: Eq + Hash + Clone> RateLimiter<K> {
    pub fn new(window: Duration, max_events: usize) -> Self {
        Self {
            window,
            max_events,
            events: HashMap::new(),
        }
    }

    /// Records an event for `key` at `now` and returns whether it should be
    /// allowed through (i.e. whether the caller should act on it — log,
    /// forward, etc). Always records the attempt, including disallowed
    /// ones, so a sustained flood keeps being throttled rather than
    /// resetting itself out of the window.
    pub fn allow(&mut self, key: K, now: Instant) -> bool {
        let window = self.window;
        let entry = self.events.entry(key).or_default();
        entry.retain(|t| now.duration_since(*t) <= window);
        let allowed = entry.len() < self.max_events;
        entry.push(now);
        allowed
    }

    /// Drops keys with no events inside the window, bounding memory for
    /// long-lived limiters with a high key cardinality.
    pub fn gc(&mut self, now: Instant) {
        let window = self.window;
        self.events
            .retain(|_, times| times.iter().any(|t| now.duration_since(*t) <= window));
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_max_events_then_throttles() {
        let mut limiter = RateLimiter::new(Duration::from_secs(60), 3);
        let now = Instant::now();
        assert!(limiter.allow("peer-a", now));
        assert!(limiter.allow("peer-a", now));
        assert!(limiter.allow("peer-a", now));
        assert!(!limiter.allow("peer-a", now));
    }

    #[test]
    fn keys_are_independent() {
        let mut limiter = RateLimiter::new(Duration::from_secs(60), 1);
        let now = Instant::now();
        assert!(limiter.allow("peer-a", now));
        assert!(limiter.allow("peer-b", now));
        assert!(!limiter.allow("peer-a", now));
    }

    #[test]
    fn events_outside_window_do_not_count() {
        let mut limiter = RateLimiter::new(Duration::from_millis(10), 1);
        let now = Instant::now();
        assert!(limiter.allow("peer-a", now));
        let later = now + Duration::from_millis(20);
        assert!(limiter.allow("peer-a", later));
    }

    #[test]
    fn gc_drops_keys_with_only_expired_events() {
        let mut limiter = RateLimiter::new(Duration::from_millis(10), 5);
        let now = Instant::now();
        limiter.allow("peer-a", now);
        assert_eq!(limiter.len(), 1);
        limiter.gc(now + Duration::from_millis(50));
        assert_eq!(limiter.len(), 0);
    }
}
