//! Fixed-cadence poll scheduling.
//!
//! The deadline advances by exactly one interval per tick, independent of
//! how long the tick took, so the cadence never drifts. A tick that
//! overruns its slot waits zero and the loop proceeds immediately; there
//! is no catch-up burst for missed slots.

use std::time::{Duration, Instant};

/// Process-wide cadence state for the poll loop.
#[derive(Debug, Clone)]
pub struct PollSchedule {
    interval: Duration,
    next_deadline: Instant,
}

impl PollSchedule {
    /// Start a schedule whose first deadline is `now` (the first tick
    /// runs immediately).
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next_deadline: now,
        }
    }

    /// Advance the deadline by one interval and return how long to wait
    /// from `now`. Never negative: a late tick gets `Duration::ZERO`.
    pub fn wait_after_tick(&mut self, now: Instant) -> Duration {
        self.next_deadline += self.interval;
        self.next_deadline.saturating_duration_since(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_wait_compensates_for_tick_duration() {
        let start = Instant::now();
        let mut schedule = PollSchedule::new(Duration::from_secs(20), start);

        // Tick took 3 s of wall time → wait 17 s.
        let wait = schedule.wait_after_tick(start + Duration::from_secs(3));
        assert_eq!(wait, Duration::from_secs(17));
    }

    #[test]
    fn late_tick_waits_zero_without_catch_up() {
        let start = Instant::now();
        let mut schedule = PollSchedule::new(Duration::from_secs(20), start);

        // Tick ran 25 s, 5 s past the slot. No negative wait.
        let wait = schedule.wait_after_tick(start + Duration::from_secs(25));
        assert_eq!(wait, Duration::ZERO);

        // The next slot is 40 s from start; only 15 s remain. The missed
        // time is absorbed, not replayed as extra ticks.
        let wait = schedule.wait_after_tick(start + Duration::from_secs(25));
        assert_eq!(wait, Duration::from_secs(15));
    }

    #[test]
    fn deadline_advances_exactly_one_interval_per_tick() {
        let start = Instant::now();
        let mut schedule = PollSchedule::new(Duration::from_secs(20), start);

        for n in 1..=5u64 {
            let wait = schedule.wait_after_tick(start);
            assert_eq!(wait, Duration::from_secs(20 * n));
        }
    }
}
