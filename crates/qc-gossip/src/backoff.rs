//! Exponential re-dial backoff, spec.md §4.5: "peer is scheduled for
//! re-dial with exponential backoff capped at a configurable ceiling."

use std::time::Duration;

/// Doubles its delay on every [`RedialBackoff::failure`], capped at
/// `max_backoff`; [`RedialBackoff::success`] resets it.
#[derive(Debug, Clone)]
pub struct RedialBackoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl RedialBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// The delay to wait before the next re-dial attempt.
    pub fn current_delay(&self) -> Duration {
        self.current
    }

    /// Records a failed connection attempt, doubling the delay (capped).
    pub fn failure(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    /// Resets the backoff to its initial delay after a successful connection.
    pub fn success(&mut self) {
        self.current = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_on_failure_up_to_the_ceiling() {
        let mut backoff = RedialBackoff::new(Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(backoff.failure(), Duration::from_millis(100));
        assert_eq!(backoff.failure(), Duration::from_millis(200));
        // next would be 400ms, capped at 350ms
        assert_eq!(backoff.failure(), Duration::from_millis(350));
        assert_eq!(backoff.current_delay(), Duration::from_millis(350));
    }

    #[test]
    fn success_resets_to_initial() {
        let mut backoff = RedialBackoff::new(Duration::from_millis(50), Duration::from_secs(10));
        backoff.failure();
        backoff.failure();
        backoff.success();
        assert_eq!(backoff.current_delay(), Duration::from_millis(50));
    }
}
