//! Rainbow challenge countdown.
//!
//! Time is always passed in, so the countdown itself is pure. The timer
//! adds cancellation: each start bumps a generation and hands back a
//! [`TimerHandle`]; only the handle of the live run can ever fire.

use chrono::{DateTime, Duration, Utc};

/// Default length of the rainbow challenge
pub const DEFAULT_RAINBOW_SECONDS: i64 = 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Countdown {
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl Countdown {
    pub fn new(started_at: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            started_at,
            duration,
        }
    }

    /// Time left, clamped at zero
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        let left = self.started_at + self.duration - now;
        if left < Duration::zero() {
            Duration::zero()
        } else {
            left.min(self.duration)
        }
    }

    /// Share of the duration still left, in `[0, 1]`
    pub fn fraction_remaining(&self, now: DateTime<Utc>) -> f64 {
        let total = self.duration.num_milliseconds();
        if total <= 0 {
            return 0.0;
        }
        (self.remaining(now).num_milliseconds() as f64 / total as f64).clamp(0.0, 1.0)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.started_at + self.duration
    }
}

/// Identifies one run of a [`CountdownTimer`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// Cancellable single-run countdown, polled by the caller's event loop
#[derive(Clone, Debug, Default)]
pub struct CountdownTimer {
    generation: u64,
    running: Option<(TimerHandle, Countdown)>,
}

impl CountdownTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new run, cancelling any previous one
    pub fn start(&mut self, duration: Duration, now: DateTime<Utc>) -> TimerHandle {
        self.generation += 1;
        let handle = TimerHandle(self.generation);
        self.running = Some((handle, Countdown::new(now, duration)));
        tracing::debug!("Countdown {:?} started for {}s", handle, duration.num_seconds());
        handle
    }

    pub fn cancel(&mut self) {
        if let Some((handle, _)) = self.running.take() {
            tracing::debug!("Countdown {:?} cancelled", handle);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn countdown(&self) -> Option<&Countdown> {
        self.running.as_ref().map(|(_, countdown)| countdown)
    }

    /// Whether `handle` belongs to the live run
    pub fn is_current(&self, handle: TimerHandle) -> bool {
        self.running.is_some_and(|(live, _)| live == handle)
    }

    /// Fire the live run if it has expired
    ///
    /// Returns its handle once; afterwards the timer is idle.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<TimerHandle> {
        let (handle, countdown) = self.running?;
        if !countdown.is_expired(now) {
            return None;
        }
        self.running = None;
        tracing::info!("Countdown {:?} expired", handle);
        Some(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_and_fraction() {
        let start = Utc::now();
        let countdown = Countdown::new(start, Duration::seconds(60));

        assert_eq!(countdown.remaining(start), Duration::seconds(60));
        assert_eq!(countdown.remaining(start + Duration::seconds(15)), Duration::seconds(45));
        assert!((countdown.fraction_remaining(start + Duration::seconds(15)) - 0.75).abs() < 1e-9);
        assert_eq!(countdown.remaining(start + Duration::seconds(90)), Duration::zero());
        assert_eq!(countdown.fraction_remaining(start + Duration::seconds(90)), 0.0);
        // Clock skew before the start never reports more than the full duration
        assert_eq!(countdown.fraction_remaining(start - Duration::seconds(5)), 1.0);
    }

    #[test]
    fn test_expiry_boundary() {
        let start = Utc::now();
        let countdown = Countdown::new(start, Duration::seconds(10));
        assert!(!countdown.is_expired(start + Duration::milliseconds(9_999)));
        assert!(countdown.is_expired(start + Duration::seconds(10)));
    }

    #[test]
    fn test_poll_fires_exactly_once() {
        let start = Utc::now();
        let mut timer = CountdownTimer::new();
        let handle = timer.start(Duration::seconds(5), start);

        assert_eq!(timer.poll(start + Duration::seconds(1)), None);
        assert!(timer.is_current(handle));
        assert_eq!(timer.poll(start + Duration::seconds(5)), Some(handle));
        assert_eq!(timer.poll(start + Duration::seconds(6)), None);
        assert!(!timer.is_running());
    }

    #[test]
    fn test_cancel_prevents_firing() {
        let start = Utc::now();
        let mut timer = CountdownTimer::new();
        timer.start(Duration::seconds(5), start);
        timer.cancel();

        assert_eq!(timer.poll(start + Duration::seconds(10)), None);
    }

    #[test]
    fn test_restart_invalidates_old_handle() {
        let start = Utc::now();
        let mut timer = CountdownTimer::new();
        let first = timer.start(Duration::seconds(5), start);
        let second = timer.start(Duration::seconds(5), start + Duration::seconds(3));

        assert_ne!(first, second);
        assert!(!timer.is_current(first));
        assert_eq!(timer.poll(start + Duration::seconds(6)), None);
        assert_eq!(timer.poll(start + Duration::seconds(8)), Some(second));
    }
}
