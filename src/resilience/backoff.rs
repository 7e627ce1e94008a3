//! Retry delays for repository lookups.

use std::time::Duration;

use rand::Rng;

/// Exponential schedule with "equal jitter": each delay lands in the upper half
/// of its exponential step, capped at `max`.
#[derive(Debug, Clone, Copy)]
pub struct BackoffSchedule {
    base_ms: u64,
    max_ms: u64,
}

impl BackoffSchedule {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self { base_ms, max_ms: max_ms.max(base_ms) }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling_ms(attempt);
        if ceiling < 2 {
            return Duration::from_millis(ceiling);
        }
        let half = ceiling / 2;
        Duration::from_millis(half + rand::thread_rng().gen_range(0..=ceiling - half))
    }

    fn ceiling_ms(&self, attempt: u32) -> u64 {
        if attempt == 0 {
            return 0;
        }
        let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
        self.base_ms.saturating_mul(factor).min(self.max_ms)
    }
}
