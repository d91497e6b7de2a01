//! Capped exponential reconnect delay.

use std::time::Duration;

/// Growth factor between consecutive attempts.
const FACTOR: f64 = 1.5;

/// Tracks reconnect attempts and yields `min(base * 1.5^(n-1), cap)`
/// for the n-th consecutive failure. Retries are unbounded.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    base: Duration,
    cap: Duration,
    attempt: u32,
}

impl ReconnectBackoff {
    /// Creates a backoff with no failures recorded.
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            attempt: 0,
        }
    }

    /// Record a failure and return how long to wait before retrying.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt = self.attempt.saturating_add(1);
        self.delay_for(self.attempt)
    }

    /// Delay for the given 1-based attempt number.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let cap_ms = self.cap.as_millis() as f64;
        let ms = (self.base.as_millis() as f64 * FACTOR.powi(exponent)).min(cap_ms);
        Duration::from_millis(ms as u64)
    }

    /// Consecutive failures so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Forget past failures after a successful connect.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grows_by_half_and_caps() {
        let mut backoff = ReconnectBackoff::new(Duration::from_secs(1), Duration::from_secs(30));
        let delays: Vec<u128> = (0..11).map(|_| backoff.next_delay().as_millis()).collect();
        assert_eq!(
            delays,
            vec![1000, 1500, 2250, 3375, 5062, 7593, 11390, 17085, 25628, 30000, 30000]
        );
        assert_eq!(backoff.attempt(), 11);
    }

    #[test]
    fn test_reset_starts_over() {
        let mut backoff = ReconnectBackoff::new(Duration::from_millis(200), Duration::from_secs(5));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
    }

    #[test]
    fn test_huge_attempt_saturates_at_cap() {
        let backoff = ReconnectBackoff::new(Duration::from_secs(1), Duration::from_secs(30));
        assert_eq!(backoff.delay_for(u32::MAX), Duration::from_secs(30));
    }
}
