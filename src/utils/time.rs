use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

/// Source of wall-clock timestamps for order updates and transactions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock: starts at `start` and advances by `step` on every
/// read, so consecutive timestamps are distinct and reproducible.
#[derive(Debug)]
pub struct SteppingClock {
    start: DateTime<Utc>,
    step_micros: i64,
    reads: AtomicI64,
}

impl SteppingClock {
    pub fn new(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            start,
            step_micros: step.as_micros() as i64,
            reads: AtomicI64::new(0),
        }
    }

    /// The timestamp the next call to `now` will return.
    pub fn peek(&self) -> DateTime<Utc> {
        let reads = self.reads.load(Ordering::Relaxed);
        self.start + ChronoDuration::microseconds(reads * self.step_micros)
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let reads = self.reads.fetch_add(1, Ordering::Relaxed);
        self.start + ChronoDuration::microseconds(reads * self.step_micros)
    }
}

/// Timer for measuring operation latency
pub struct LatencyTimer {
    start: Instant,
}

impl LatencyTimer {
    /// Start a new timer
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Stop the timer and return elapsed duration
    pub fn stop(self) -> Duration {
        self.start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::thread;

    #[test]
    fn test_stepping_clock_advances_per_read() {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let clock = SteppingClock::new(start, Duration::from_millis(1));

        assert_eq!(clock.peek(), start);
        assert_eq!(clock.now(), start);
        assert_eq!(clock.now(), start + ChronoDuration::milliseconds(1));
        assert_eq!(clock.peek(), start + ChronoDuration::milliseconds(2));
    }

    #[test]
    fn test_system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let t1 = clock.now();
        thread::sleep(Duration::from_millis(1));
        assert!(clock.now() > t1);
    }

    #[test]
    fn test_latency_timer() {
        let timer = LatencyTimer::start();
        thread::sleep(Duration::from_millis(1));
        let elapsed = timer.stop();

        assert!(elapsed >= Duration::from_millis(1));
    }
}
