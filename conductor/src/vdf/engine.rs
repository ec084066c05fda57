//! The sequential VDF: `compute`, `verify`, and `derive_seed`.
//!
//! `compute` is strictly sequential and must run on the dedicated
//! blocking pool (see concurrency model, SPEC_FULL.md §5) so it never
//! starves the agreement I/O pool. It is spawned via
//! [`VdfEngine::spawn_compute`], which hands back a [`VdfHandle`] that
//! can be cancelled and polled for progress — cancellation is only
//! observed at the next `progress_interval` boundary, matching §4.1.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::crypto::hash::{sequential_hash, sequential_hash_with_progress};
use crate::types::ids::{DayNumber, Hash256};

/// Stateless VDF parameters: the genesis seed (fixed at federation
/// formation) and the progress-reporting / cancellation granularity.
#[derive(Clone, Debug)]
pub struct VdfEngine {
    genesis_seed: [u8; 32],
    progress_interval: u64,
}

impl VdfEngine {
    pub fn new(genesis_seed: [u8; 32], progress_interval: u64) -> Self {
        Self {
            genesis_seed,
            progress_interval: progress_interval.max(1),
        }
    }

    /// `seed(d) = Hash("day-seed" || d_be_bytes || genesis_seed)`.
    /// Deterministic from `day_number` and genesis alone — independent of
    /// any proof of the previous day (§3 invariants).
    pub fn derive_seed(&self, day_number: DayNumber) -> [u8; 32] {
        Hash256::compute_concat(&[b"day-seed", &day_number.to_be_bytes(), &self.genesis_seed]).0
    }

    /// Canonical, side-effect-free verification: re-runs the full chain.
    pub fn verify(&self, seed: &[u8; 32], difficulty: u64, output: &[u8; 32]) -> bool {
        sequential_hash(seed, difficulty) == *output
    }

    /// Runs `compute` synchronously to completion on the calling thread.
    /// Intended only for tests/benchmarks at small difficulty; real
    /// computations go through [`Self::spawn_compute`].
    pub fn compute_blocking(&self, seed: &[u8; 32], difficulty: u64) -> [u8; 32] {
        sequential_hash(seed, difficulty)
    }

    /// Spawns the VDF computation on the current blocking pool via
    /// `tokio::task::spawn_blocking`, returning a handle that exposes
    /// cancellation and progress.
    pub fn spawn_compute(&self, seed: [u8; 32], difficulty: u64) -> VdfHandle {
        let cancel = Arc::new(AtomicBool::new(false));
        let progress = Arc::new(AtomicU64::new(0));
        let (result_tx, result_rx) = oneshot::channel();

        let interval = self.progress_interval;
        let cancel_for_task = cancel.clone();
        let progress_for_task = progress.clone();

        tokio::task::spawn_blocking(move || {
            let result = sequential_hash_with_progress(&seed, difficulty, interval, |done| {
                progress_for_task.store(done, Ordering::Relaxed);
                !cancel_for_task.load(Ordering::Relaxed)
            });
            let _ = result_tx.send(result);
        });

        VdfHandle {
            cancel,
            progress,
            result_rx: Some(result_rx),
        }
    }
}

/// Handle to an in-flight VDF computation.
pub struct VdfHandle {
    cancel: Arc<AtomicBool>,
    progress: Arc<AtomicU64>,
    result_rx: Option<oneshot::Receiver<Option<[u8; 32]>>>,
}

impl VdfHandle {
    /// Requests cancellation. Observed at the next progress boundary;
    /// does not interrupt mid-hash.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Iterations completed so far.
    pub fn progress(&self) -> u64 {
        self.progress.load(Ordering::Relaxed)
    }

    /// Awaits completion. Returns `None` if cancelled before finishing.
    pub async fn wait(mut self) -> Option<[u8; 32]> {
        match self.result_rx.take() {
            Some(rx) => rx.await.ok().flatten(),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_seed_is_deterministic_and_day_sensitive() {
        let engine = VdfEngine::new([1u8; 32], 100);
        assert_eq!(engine.derive_seed(5), engine.derive_seed(5));
        assert_ne!(engine.derive_seed(5), engine.derive_seed(6));
    }

    #[test]
    fn verify_accepts_honest_output_rejects_tampered() {
        let engine = VdfEngine::new([2u8; 32], 10);
        let seed = engine.derive_seed(1);
        let output = engine.compute_blocking(&seed, 500);
        assert!(engine.verify(&seed, 500, &output));
        let mut tampered = output;
        tampered[0] ^= 0xFF;
        assert!(!engine.verify(&seed, 500, &tampered));
    }

    #[tokio::test]
    async fn spawn_compute_matches_blocking_compute() {
        let engine = VdfEngine::new([3u8; 32], 50);
        let seed = engine.derive_seed(1);
        let expected = engine.compute_blocking(&seed, 2000);
        let handle = engine.spawn_compute(seed, 2000);
        let output = handle.wait().await.expect("not cancelled");
        assert_eq!(output, expected);
    }

    #[tokio::test]
    async fn cancel_stops_computation() {
        let engine = VdfEngine::new([4u8; 32], 10);
        let seed = engine.derive_seed(1);
        let handle = engine.spawn_compute(seed, 10_000_000);
        handle.cancel();
        let output = handle.wait().await;
        assert!(output.is_none());
    }
}
