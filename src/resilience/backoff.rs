//! Exponential backoff with jitter for transient socket failures.

use std::time::Duration;

use rand::Rng;

use crate::config::WorkerConfig;

/// Calculate exponential backoff delay with jitter.
///
/// `attempt` 0 means no failure yet and yields no delay. The delay doubles
/// per attempt from `base_ms`, is capped at `max_ms`, and gains up to 10%
/// jitter on top.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Consecutive-failure counter for one service loop.
#[derive(Debug, Clone)]
pub struct Backoff {
    attempt: u32,
    base_ms: u64,
    max_ms: u64,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            attempt: 0,
            base_ms,
            max_ms,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.backoff_base_ms, config.backoff_max_ms)
    }

    /// Record a failure and return how long to wait before retrying.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        calculate_backoff(self.attempt, self.base_ms, self.max_ms)
    }

    /// A success clears the failure streak.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        assert_eq!(calculate_backoff(0, 100, 2000), Duration::ZERO);

        let b1 = calculate_backoff(1, 100, 2000);
        assert!(b1.as_millis() >= 100 && b1.as_millis() < 110);

        let b2 = calculate_backoff(2, 100, 2000);
        assert!(b2.as_millis() >= 200);

        let max = calculate_backoff(10, 100, 1000);
        assert!(max.as_millis() >= 1000 && max.as_millis() < 1100);
    }

    #[test]
    fn huge_attempt_does_not_overflow() {
        let d = calculate_backoff(u32::MAX, 100, 2000);
        assert!(d.as_millis() < 2200);
    }

    #[test]
    fn backoff_streak_resets() {
        let mut backoff = Backoff::new(10, 1000);
        assert!(backoff.next_delay().as_millis() >= 10);
        assert!(backoff.next_delay().as_millis() >= 20);
        assert_eq!(backoff.attempts(), 2);

        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert!(backoff.next_delay().as_millis() < 20);
    }
}
