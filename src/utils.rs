use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

static CLOCK_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Monotonic nanoseconds since the process clock epoch
pub fn monotonic_ns() -> u64 {
    u64::try_from(CLOCK_EPOCH.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

/// Paces a loop to at most one iteration per period.
#[derive(Debug)]
pub struct Throttle {
    last: Instant,
}

impl Throttle {
    pub fn start() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Sleeps until `period` has elapsed since the previous call (or since
    /// `start`), then begins the next period.
    pub fn wait(&mut self, period: Duration) {
        let elapsed = self.last.elapsed();
        match period.checked_sub(elapsed) {
            Some(remaining) if !remaining.is_zero() => std::thread::sleep(remaining),
            // Let waiting consumers reach the lock before the next period.
            _ => std::thread::yield_now(),
        }
        self.last = Instant::now();
    }
}

/// Exposure in microseconds as a sleep duration; negative or NaN is zero.
pub fn micros_f32(us: f32) -> Duration {
    Duration::try_from_secs_f32(us * 1e-6).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_paces_iterations() {
        let t0 = Instant::now();
        let mut throttle = Throttle::start();
        for _ in 0..3 {
            throttle.wait(Duration::from_millis(15));
        }
        assert!(t0.elapsed() >= Duration::from_millis(45));
    }

    #[test]
    fn micros_conversion() {
        assert_eq!(micros_f32(-3.0), Duration::ZERO);
        assert_eq!(micros_f32(f32::NAN), Duration::ZERO);
        let d = micros_f32(10_000.0);
        assert!(d >= Duration::from_micros(9_999) && d <= Duration::from_micros(10_001));
    }

    #[test]
    fn clock_is_monotonic() {
        let a = monotonic_ns();
        let b = monotonic_ns();
        assert!(b >= a);
    }
}
