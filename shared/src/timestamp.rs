use std::time::Instant;

/// Monotonic clock owned by one node.
///
/// Supplies both the node-local logical time (seconds since the node
/// started, used by the peer table and housekeeping) and the 32-bit
/// microsecond wire timestamp carried in envelopes. The wire timestamp wraps
/// roughly every 71 minutes; round trips are computed with wrapping
/// subtraction so the wrap is harmless for any realistic RTT.
pub struct Clock {
    start: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Seconds since this node started
    pub fn now_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Wrapping microsecond timestamp for the wire
    pub fn wire_now(&self) -> u32 {
        self.start.elapsed().as_micros() as u32
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Round trip in milliseconds from an ACK arrival time and the timestamp it
/// echoed, both in wrapping wire microseconds
pub fn trip_time_ms(now: u32, echoed: u32) -> f64 {
    f64::from(now.wrapping_sub(echoed)) / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_monotonic() {
        let clock = Clock::new();
        let a = clock.now_secs();
        let b = clock.now_secs();
        assert!(b >= a);
    }

    #[test]
    fn trip_time_simple() {
        assert_eq!(trip_time_ms(5_000, 2_000), 3.0);
    }

    #[test]
    fn trip_time_across_the_wrap() {
        // Sent just before the 32-bit microsecond counter wrapped
        let echoed = u32::MAX - 500;
        let now = 1_500;
        assert_eq!(trip_time_ms(now, echoed), 2.001);
    }
}
