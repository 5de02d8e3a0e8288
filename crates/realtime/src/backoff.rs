//! Reconnect backoff policy

use std::time::Duration;

/// Exponential backoff schedule for reconnect attempts
///
/// Delay for attempt `n` (0-based) is `min(base * 2^n, cap)`. The only state
/// is the attempt counter: `next_delay` advances it, `reset` zeroes it on a
/// successful connection, and nothing else mutates it.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base: Duration,
    cap: Duration,
    attempt: u32,
}

impl ReconnectPolicy {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            attempt: 0,
        }
    }

    /// Delay for a given attempt number, independent of internal state
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.base.as_millis() as u64;
        let cap_ms = self.cap.as_millis() as u64;
        // Saturating math: attempt 64+ would overflow a shift
        let scaled = base_ms.saturating_mul(2u64.saturating_pow(attempt));
        Duration::from_millis(scaled.min(cap_ms))
    }

    /// Delay for the current attempt; advances the counter
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.delay_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Consecutive failed attempts so far
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Back to a cold schedule; called once per successful connection
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy::new(Duration::from_secs(1), Duration::from_secs(30))
    }

    #[test]
    fn test_first_delay_is_base() {
        assert_eq!(policy().delay_for(0), Duration::from_secs(1));
    }

    #[test]
    fn test_delays_double_until_cap() {
        let mut p = policy();
        let delays: Vec<u64> = (0..7).map(|_| p.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);
        assert_eq!(p.attempt(), 7);
    }

    #[test]
    fn test_cap_holds_at_extreme_attempts() {
        let p = policy();
        // Far past where the shift would overflow
        assert_eq!(p.delay_for(64), Duration::from_secs(30));
        assert_eq!(p.delay_for(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_reset_returns_to_base() {
        let mut p = policy();
        for _ in 0..5 {
            p.next_delay();
        }
        assert!(p.attempt() > 0);
        p.reset();
        assert_eq!(p.attempt(), 0);
        assert_eq!(p.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_sub_second_base() {
        let p = ReconnectPolicy::new(Duration::from_millis(250), Duration::from_secs(8));
        assert_eq!(p.delay_for(0), Duration::from_millis(250));
        assert_eq!(p.delay_for(3), Duration::from_millis(2000));
        assert_eq!(p.delay_for(6), Duration::from_secs(8));
    }
}
