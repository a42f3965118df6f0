use std::collections::VecDeque;

const ROLLING_WINDOW: usize = 10;

/// Rolling round-trip-time statistics for one transport channel.
///
/// `avg` is the running arithmetic mean of every sample recorded so far;
/// `last_window_max` tracks only the last ten samples, which reacts faster
/// to a congested path than the lifetime maximum does.
#[derive(Debug, Clone, Default)]
pub struct TriptimeStats {
    pub last: f64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    samples: u64,
    window: VecDeque<f64>,
}

impl TriptimeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sample_ms: f64) {
        self.samples += 1;
        self.last = sample_ms;
        if self.samples == 1 {
            self.min = sample_ms;
            self.max = sample_ms;
            self.avg = sample_ms;
        } else {
            self.min = self.min.min(sample_ms);
            self.max = self.max.max(sample_ms);
            let n = self.samples as f64;
            self.avg = (self.avg * (n - 1.0) + sample_ms) / n;
        }
        self.window.push_back(sample_ms);
        if self.window.len() > ROLLING_WINDOW {
            self.window.pop_front();
        }
    }

    /// Maximum of the last ten samples, 0.0 before any sample
    pub fn last_window_max(&self) -> f64 {
        self.window.iter().copied().fold(0.0, f64::max)
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }
}
