use std::time::Duration;

/// Upper bound on any single retry delay
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Exponential retry schedule: `base * 2^attempt`, capped at [`MAX_BACKOFF`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub const fn new(base: Duration) -> Self {
        Self {
            base,
            max: MAX_BACKOFF,
        }
    }

    pub fn from_millis(base_ms: u64) -> Self {
        Self::new(Duration::from_millis(base_ms))
    }

    /// Delay before retry number `attempt + 1`
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(20));
        self.base.saturating_mul(factor).min(self.max)
    }
}
