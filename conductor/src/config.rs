//! Top-level configuration for a validator node.
//!
//! This module aggregates configuration for:
//!
//! - VDF difficulty and day-progress tuning (`VdfConfig`),
//! - storage (RocksDB path and creation flags),
//! - peer resilience: retry backoff and circuit breaking (`PeerConfig`),
//! - metrics exporter (enable flag + listen address).
//!
//! The goal is a single `ConductorConfig` struct that higher-level
//! binaries (e.g. `main.rs`) can construct from defaults, config files,
//! or environment variables as needed.

use std::net::SocketAddr;
use std::time::Duration;

use crate::storage::RocksDbConfig;
use crate::vdf::difficulty::{DEFAULT_ADJUSTMENT_INTERVAL_DAYS, DEFAULT_DIFFICULTY_INITIAL};

/// Tuning for the VDF day counter (§4.2, §4.5).
#[derive(Clone, Debug)]
pub struct VdfConfig {
    /// Initial iteration count for day 0, before any difficulty
    /// adjustment has taken place.
    pub difficulty_initial: u64,
    /// How many VDF iterations elapse between progress reports
    /// (`VdfHandle::progress`).
    pub progress_interval: u64,
    /// Number of days averaged over when retargeting difficulty.
    pub adjustment_interval_days: u32,
}

impl Default for VdfConfig {
    fn default() -> Self {
        Self {
            difficulty_initial: DEFAULT_DIFFICULTY_INITIAL,
            progress_interval: 1_000_000,
            adjustment_interval_days: DEFAULT_ADJUSTMENT_INTERVAL_DAYS,
        }
    }
}

/// Tuning for the validator set and threshold quorum (§4.3, §4.8).
#[derive(Clone, Debug)]
pub struct ValidatorSetConfig {
    /// Minimum validator-set size this node will run consensus with.
    pub min_validators: usize,
    /// Numerator/denominator of the quorum fraction, e.g. `(2, 3)` for
    /// `2f+1` out of `3f+1`.
    pub threshold_ratio: (u32, u32),
}

impl Default for ValidatorSetConfig {
    fn default() -> Self {
        Self {
            min_validators: 4,
            threshold_ratio: (2, 3),
        }
    }
}

/// Tuning for the epoch orchestrator's timeout and retry behavior
/// (§4.12, §7).
#[derive(Clone, Debug)]
pub struct PeerConfig {
    /// How long an epoch may run before `ConsensusTimeout` applies.
    pub epoch_timeout: Duration,
    /// TTL for the gossip seen-message cache (`SeenMessageCache`).
    pub seen_cache_ttl: Duration,
    /// Consecutive failures against one peer before its circuit opens.
    pub circuit_breaker_threshold: u32,
    /// How long an open circuit stays open before a retry is allowed.
    pub circuit_breaker_open: Duration,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            epoch_timeout: Duration::from_millis(120_000),
            seen_cache_ttl: Duration::from_millis(86_400_000),
            circuit_breaker_threshold: 5,
            circuit_breaker_open: Duration::from_millis(60_000),
        }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        // Safe to unwrap: this is a fixed, valid address literal.
        let addr: SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self {
            enabled: true,
            listen_addr: addr,
        }
    }
}

/// Top-level configuration for a validator node.
///
/// Aggregates all the sub-configs needed to wire up a typical node:
///
/// - VDF tuning (`vdf`),
/// - validator-set/quorum tuning (`validator_set`),
/// - persistent storage (`storage`),
/// - peer resilience and timeouts (`peer`),
/// - Prometheus metrics exporter (`metrics`).
#[derive(Clone, Debug, Default)]
pub struct ConductorConfig {
    pub vdf: VdfConfig,
    pub validator_set: ValidatorSetConfig,
    pub storage: RocksDbConfig,
    pub peer: PeerConfig,
    pub metrics: MetricsConfig,
}
