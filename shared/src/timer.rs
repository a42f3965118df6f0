use std::time::{Duration, Instant};

/// A repeating interval timer polled by the reactor loop
pub struct Timer {
    interval: Duration,
    last: Instant,
}

impl Timer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Instant::now(),
        }
    }

    /// Returns whether the interval has elapsed since the last reset
    pub fn ringing(&self) -> bool {
        self.last.elapsed() >= self.interval
    }

    /// Restart the interval from now
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
