//! Reconnect delay policy
//!
//! Fixed warm-up delays followed by doubling, capped. Reconnection never gives
//! up on its own; only an explicit disconnect stops it.

use std::time::Duration;

/// Default warm-up delays in seconds
pub const DEFAULT_RECONNECT_DELAYS_SECS: [u64; 4] = [2, 5, 10, 30];

/// Default cap on any single delay
pub const DEFAULT_MAX_RECONNECT_DELAY_SECS: u64 = 60;

/// Delay sequence used between reconnect attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    delays: Vec<Duration>,
    max_delay: Duration,
}

impl ReconnectPolicy {
    /// Create a policy from explicit warm-up delays and a cap
    #[must_use]
    pub fn new(delays: Vec<Duration>, max_delay: Duration) -> Self {
        Self { delays, max_delay }
    }

    /// Delay to wait before reconnect attempt `attempt` (1-based)
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let index = attempt.saturating_sub(1) as usize;
        let delay = match self.delays.get(index) {
            Some(delay) => *delay,
            None => {
                let Some(last) = self.delays.last() else {
                    return self.max_delay;
                };
                let doublings = (index + 1 - self.delays.len()).min(16) as u32;
                last.saturating_mul(2u32.saturating_pow(doublings))
            }
        };
        delay.min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_RECONNECT_DELAYS_SECS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
            Duration::from_secs(DEFAULT_MAX_RECONNECT_DELAY_SECS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sequence() {
        let policy = ReconnectPolicy::default();
        let secs: Vec<u64> = (1..=7).map(|n| policy.delay_for(n).as_secs()).collect();
        assert_eq!(secs, vec![2, 5, 10, 30, 60, 60, 60]);
    }

    #[test]
    fn test_doubling_after_warmup_is_capped() {
        let policy = ReconnectPolicy::new(
            vec![Duration::from_millis(100)],
            Duration::from_millis(700),
        );
        let ms: Vec<u128> = (1..=5).map(|n| policy.delay_for(n).as_millis()).collect();
        assert_eq!(ms, vec![100, 200, 400, 700, 700]);
    }

    #[test]
    fn test_never_exceeds_cap_for_large_attempts() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay_for(10_000), Duration::from_secs(60));
        assert_eq!(policy.delay_for(0), Duration::from_secs(2));
    }

    #[test]
    fn test_empty_warmup_uses_cap() {
        let policy = ReconnectPolicy::new(Vec::new(), Duration::from_secs(3));
        assert_eq!(policy.delay_for(1), Duration::from_secs(3));
    }
}
