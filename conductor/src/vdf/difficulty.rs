//! Difficulty adjustment policy (§4.1).
//!
//! Every `adjustment_interval_days`, the orchestrator computes the median
//! VDF completion time across the last interval over known validators and
//! rescales difficulty toward the target, bounded to at most ×2 or ÷2 per
//! adjustment. Only the median is consulted — a handful of adversarially
//! fast or slow reports cannot move it.

use std::time::Duration;

/// Default target: ~24h of sequential work on reference hardware.
pub const DEFAULT_DIFFICULTY_INITIAL: u64 = 86_400_000;
pub const DEFAULT_ADJUSTMENT_INTERVAL_DAYS: u32 = 10;

#[derive(Clone, Debug)]
pub struct DifficultyPolicy {
    /// Target completion time for one day's VDF, in seconds.
    pub target_seconds: u64,
    pub adjustment_interval_days: u32,
}

impl Default for DifficultyPolicy {
    fn default() -> Self {
        Self {
            target_seconds: 86_400,
            adjustment_interval_days: DEFAULT_ADJUSTMENT_INTERVAL_DAYS,
        }
    }
}

impl DifficultyPolicy {
    /// Computes the median of `completion_times`. Returns `None` for an
    /// empty slice.
    fn median(completion_times: &[Duration]) -> Option<Duration> {
        if completion_times.is_empty() {
            return None;
        }
        let mut sorted: Vec<Duration> = completion_times.to_vec();
        sorted.sort();
        let mid = sorted.len() / 2;
        Some(if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2
        } else {
            sorted[mid]
        })
    }

    /// Returns the next difficulty given the current one and the
    /// completion times observed over the interval just ended, or the
    /// unchanged difficulty if the median is within 10% of target or no
    /// samples are available.
    pub fn next_difficulty(&self, current_difficulty: u64, completion_times: &[Duration]) -> u64 {
        let Some(median) = Self::median(completion_times) else {
            return current_difficulty;
        };
        let median_secs = median.as_secs_f64().max(0.001);
        let target = self.target_seconds as f64;
        let deviation = (median_secs - target).abs() / target;
        if deviation <= 0.10 {
            return current_difficulty;
        }
        let raw_factor = target / median_secs;
        let bounded_factor = raw_factor.clamp(0.5, 2.0);
        let next = (current_difficulty as f64 * bounded_factor).round() as u64;
        next.max(1)
    }
}
