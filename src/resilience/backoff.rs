//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Doubling delay capped at `max`, plus up to 10% random jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
    max: Duration,
}

impl BackoffPolicy {
    pub const fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay before retry number `attempt` (1-based). Attempt 0 never waits.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let factor = 2u32.saturating_pow(attempt - 1);
        let capped = self.base.saturating_mul(factor).min(self.max);

        let jitter_range = capped.as_millis() as u64 / 10;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..jitter_range)
        } else {
            0
        };

        capped + Duration::from_millis(jitter)
    }
}
