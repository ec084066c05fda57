//! Exponential backoff with jitter for peer request retries (§4.12).

use rand::Rng;
use std::time::Duration;

pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const JITTER_FRACTION: f64 = 0.10;

/// Doubling backoff policy with bounded jitter, capped at a maximum delay
/// and a maximum attempt count.
#[derive(Clone, Debug)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl BackoffPolicy {
    /// Base delay before jitter for the given zero-indexed attempt number,
    /// doubling each attempt and capped at `max_delay`.
    fn base_delay(&self, attempt: u32) -> Duration {
        let shift = attempt.min(32);
        let scaled = self.initial_delay.saturating_mul(1u32 << shift);
        scaled.min(self.max_delay)
    }

    /// Delay to wait before `attempt` (0-indexed), with up to ±10% jitter,
    /// or `None` if `attempt` has exhausted `max_attempts`.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let base = self.base_delay(attempt);
        let jitter_range = base.as_secs_f64() * JITTER_FRACTION;
        let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
        let jittered = (base.as_secs_f64() + jitter).max(0.0);
        Some(Duration::from_secs_f64(jittered))
    }

    pub fn exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }
}
