use crate::matrix::Real;
use crate::real;

/// Linearly decaying learning rate.
///
/// Only the aggregator calls [`LearningRate::update`]; workers call
/// [`LearningRate::current`] without synchronization and may see a value
/// that is one update behind.
#[derive(Debug)]
pub struct LearningRate {
    init: real,
    min: real,
    /// Amount of work over which the rate decays from `init` to `min`.
    total: u64,
    current: Real,
}

impl LearningRate {
    pub fn new(init: real, min: real, total: u64) -> Self {
        let current = Real::default();
        current.set(init);
        LearningRate {
            init,
            min,
            total: total.max(1),
            current,
        }
    }

    /// A rate that never changes.
    pub fn constant(lr: real) -> Self {
        LearningRate::new(lr, lr, 1)
    }

    #[inline]
    pub fn current(&self) -> real {
        self.current.get()
    }

    pub fn min(&self) -> real {
        self.min
    }

    /// Recompute the rate after `processed` items in total:
    /// `max(min, init * (1 - processed / total))`. The rate never goes back up.
    pub fn update(&self, processed: u64) {
        let now = self.current.get();
        if now <= self.min {
            self.current.set(self.min);
            return;
        }
        let decayed = self.init * (1.0 - processed as f64 / self.total as f64) as real;
        self.current.set(decayed.max(self.min).min(now));
    }
}
