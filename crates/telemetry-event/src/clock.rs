//! Monotonic producer clock

use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Wall clock that never goes backwards.
///
/// Shared by every producer on a node so that all emitted events carry a
/// non-decreasing timestamp even if NTP steps the system clock back.
#[derive(Debug, Default)]
pub struct EventClock {
    last_nanos: AtomicI64,
}

impl EventClock {
    /// Create a new clock
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time, clamped to the last value handed out
    pub fn now(&self) -> DateTime<Utc> {
        self.observe(Utc::now())
    }

    /// Clamp an externally sampled instant against the clock
    pub fn observe(&self, sample: DateTime<Utc>) -> DateTime<Utc> {
        let nanos = sample.timestamp_nanos_opt().unwrap_or(i64::MAX);
        let previous = self.last_nanos.fetch_max(nanos, Ordering::AcqRel);
        Utc.timestamp_nanos(nanos.max(previous))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_never_goes_backwards() {
        let clock = EventClock::new();
        let t0 = Utc::now();
        let first = clock.observe(t0);
        let stepped_back = clock.observe(t0 - Duration::seconds(5));
        assert_eq!(first, t0);
        assert_eq!(stepped_back, t0);

        let later = clock.observe(t0 + Duration::milliseconds(10));
        assert!(later > first);
    }

    #[test]
    fn test_now_is_non_decreasing() {
        let clock = EventClock::new();
        let mut previous = clock.now();
        for _ in 0..1000 {
            let next = clock.now();
            assert!(next >= previous);
            previous = next;
        }
    }
}
