use rand::Rng;
use std::ops::Range;
use std::time::Duration;

/// Source of the dwell time spent on a rendered page before capturing it.
pub trait DelayProvider: Send + Sync {
    fn next_delay(&self) -> Duration;
}

/// Uniformly random delay in `[min, max)`.
#[derive(Debug, Clone)]
pub struct RandomDelay {
    range: Range<Duration>,
}

impl RandomDelay {
    /// Panics when `min >= max`; config validation rejects such ranges first.
    pub fn new(min: Duration, max: Duration) -> Self {
        assert!(min < max, "delay range must not be empty");
        Self { range: min..max }
    }
}

impl Default for RandomDelay {
    fn default() -> Self {
        Self::new(Duration::from_millis(2000), Duration::from_millis(4000))
    }
}

impl DelayProvider for RandomDelay {
    fn next_delay(&self) -> Duration {
        rand::thread_rng().gen_range(self.range.clone())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FixedDelay(pub Duration);

impl DelayProvider for FixedDelay {
    fn next_delay(&self) -> Duration {
        self.0
    }
}
