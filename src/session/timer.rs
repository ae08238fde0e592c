//! Fixed-period sampling timer
//!
//! The timer only tracks deadlines; the owner calls `fire` from its event
//! loop.

use std::time::{Duration, Instant};

/// Interval between metering samples
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(30);

#[derive(Debug, Clone)]
pub struct SamplingTimer {
    interval: Duration,
    next_fire: Option<Instant>,
    generation: u64,
}

impl SamplingTimer {
    pub fn new() -> Self {
        Self::with_interval(SAMPLE_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            next_fire: None,
            generation: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Arm the timer, replacing any previous schedule
    pub fn start(&mut self, now: Instant) {
        self.generation += 1;
        self.next_fire = Some(now + self.interval);
    }

    /// Disarm the timer. Safe to call repeatedly.
    pub fn cancel(&mut self) {
        self.next_fire = None;
    }

    pub fn is_active(&self) -> bool {
        self.next_fire.is_some()
    }

    /// Bumped on every `start`, so a driver can tell a restart from a
    /// continuation of the schedule it was spawned for
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a tick is due at `now`
    ///
    /// Reports at most one tick per call. Missed ticks are skipped rather
    /// than replayed in a burst.
    pub fn fire(&mut self, now: Instant) -> bool {
        let Some(deadline) = self.next_fire else {
            return false;
        };
        if now < deadline {
            return false;
        }

        let mut next = deadline + self.interval;
        if next <= now {
            next = now + self.interval;
        }
        self.next_fire = Some(next);
        true
    }

    /// Time left until the next tick, zero if one is already due
    pub fn time_until_next(&self, now: Instant) -> Option<Duration> {
        self.next_fire
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}

impl Default for SamplingTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_timer_never_fires() {
        let mut timer = SamplingTimer::new();
        let now = Instant::now();
        assert!(!timer.is_active());
        assert!(!timer.fire(now + Duration::from_secs(10)));
        assert_eq!(timer.time_until_next(now), None);
    }

    #[test]
    fn test_fires_once_per_interval() {
        let mut timer = SamplingTimer::new();
        let t0 = Instant::now();
        timer.start(t0);

        assert!(!timer.fire(t0 + Duration::from_millis(29)));
        assert!(timer.fire(t0 + Duration::from_millis(30)));
        assert!(!timer.fire(t0 + Duration::from_millis(31)));
        assert!(timer.fire(t0 + Duration::from_millis(60)));
    }

    #[test]
    fn test_missed_ticks_are_not_replayed() {
        let mut timer = SamplingTimer::new();
        let t0 = Instant::now();
        timer.start(t0);

        let late = t0 + Duration::from_millis(500);
        assert!(timer.fire(late));
        assert!(!timer.fire(late));
        assert_eq!(timer.time_until_next(late), Some(SAMPLE_INTERVAL));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut timer = SamplingTimer::new();
        let t0 = Instant::now();
        timer.start(t0);
        timer.cancel();
        timer.cancel();
        assert!(!timer.is_active());
        assert!(!timer.fire(t0 + Duration::from_secs(1)));
    }

    #[test]
    fn test_restart_bumps_generation() {
        let mut timer = SamplingTimer::new();
        let t0 = Instant::now();
        timer.start(t0);
        let first = timer.generation();
        timer.start(t0 + Duration::from_millis(10));
        assert_eq!(timer.generation(), first + 1);
        assert!(!timer.fire(t0 + Duration::from_millis(35)));
        assert!(timer.fire(t0 + Duration::from_millis(40)));
    }
}
