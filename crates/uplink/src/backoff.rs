//! Reconnect Backoff

use std::time::Duration;

/// Capped exponential delay between reconnect attempts
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
    consecutive_failures: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.max(Duration::from_millis(1));
        let max = max.max(initial);
        Self {
            initial,
            max,
            current: initial,
            consecutive_failures: 0,
        }
    }

    /// Delay to wait before the next attempt; doubles up to the ceiling
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        delay
    }

    /// Back to the initial delay after a success
    pub fn reset(&mut self) {
        self.current = self.initial;
        self.consecutive_failures = 0;
    }

    /// Failures since the last reset
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30))
    }
}
