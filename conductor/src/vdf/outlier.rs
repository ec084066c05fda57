//! Memory-resident wall-clock reference for VDF-too-fast detection.
//!
//! This is the one place in the crate allowed to read the wall clock. It
//! exists purely to flag peers whose claimed VDF completion is
//! implausibly fast; it never participates in any safety-relevant
//! decision and is never serialized, persisted, or sent to a peer (see
//! SPEC_FULL.md §D.4). The calibration window is bounded and the whole
//! structure is zeroized on drop.

use std::time::{Duration, Instant};

/// One local or peer-observed VDF completion sample, kept only in memory.
#[derive(Clone, Copy, Debug)]
struct Sample {
    day: u64,
    elapsed: Duration,
}

/// Process-lifetime, memory-only calibration window for outlier
/// detection. Constructed once at process start; `Drop` clears the
/// window so no trace of timing samples survives the process.
pub struct WallClockReference {
    process_start: Instant,
    window: Vec<Sample>,
    window_capacity: usize,
}

impl WallClockReference {
    pub fn new(window_capacity: usize) -> Self {
        Self {
            process_start: Instant::now(),
            window: Vec::with_capacity(window_capacity),
            window_capacity,
        }
    }

    pub fn uptime(&self) -> Duration {
        self.process_start.elapsed()
    }

    /// Records a completion (local computation finish, or a peer proof's
    /// observed inter-arrival delta) into the bounded calibration window.
    pub fn record_completion(&mut self, day: u64, elapsed: Duration) {
        if self.window.len() == self.window_capacity {
            self.window.remove(0);
        }
        self.window.push(Sample { day, elapsed });
    }

    /// The 5th-percentile completion time over the current window, or
    /// `None` if there are not yet enough samples to calibrate against.
    pub fn percentile_5th(&self) -> Option<Duration> {
        if self.window.is_empty() {
            return None;
        }
        let mut sorted: Vec<Duration> = self.window.iter().map(|s| s.elapsed).collect();
        sorted.sort();
        let idx = ((sorted.len() - 1) as f64 * 0.05).round() as usize;
        sorted.get(idx).copied()
    }

    /// `true` if `observed` is faster than the 5th percentile of the
    /// expected window — the trigger condition for `VDF_TOO_FAST`
    /// evidence (§4.1, §4.10).
    pub fn is_too_fast(&self, observed: Duration) -> bool {
        match self.percentile_5th() {
            Some(threshold) => observed < threshold,
            None => false,
        }
    }
}

impl Drop for WallClockReference {
    fn drop(&mut self) {
        for sample in self.window.iter_mut() {
            sample.elapsed = Duration::ZERO;
            sample.day = 0;
        }
        self.window.clear();
        self.window.shrink_to_fit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_threshold_before_any_samples() {
        let reference = WallClockReference::new(100);
        assert!(!reference.is_too_fast(Duration::from_millis(1)));
    }

    #[test]
    fn flags_completion_faster_than_fifth_percentile() {
        let mut reference = WallClockReference::new(100);
        for day in 0..100u64 {
            reference.record_completion(day, Duration::from_secs(86_400));
        }
        // A couple of slightly-faster samples establish a nonzero 5th pct.
        reference.record_completion(100, Duration::from_secs(86_000));
        reference.record_completion(101, Duration::from_secs(86_100));

        assert!(reference.is_too_fast(Duration::from_secs(1)));
        assert!(!reference.is_too_fast(Duration::from_secs(86_400)));
    }

    #[test]
    fn window_is_bounded() {
        let mut reference = WallClockReference::new(3);
        for day in 0..10u64 {
            reference.record_completion(day, Duration::from_secs(day));
        }
        assert_eq!(reference.window.len(), 3);
    }
}
