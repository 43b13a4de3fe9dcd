//! Exponential backoff with a ceiling

use std::time::Duration;

/// Doubling delay schedule capped at `max`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
        }
    }

    /// Delay for the given 0-based step: `base * 2^step`, capped at `max`
    pub fn delay(&self, step: u32) -> Duration {
        let factor = 2u32.saturating_pow(step.min(31));
        self.base.saturating_mul(factor).min(self.max)
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn max(&self) -> Duration {
        self.max
    }
}
