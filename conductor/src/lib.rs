//! Conductor: the consensus core for a federated, privacy-first social
//! network.
//!
//! This crate provides the building blocks for a validator node:
//!
//! - strongly-typed domain types (`types`),
//! - hashing, signing, and threshold-BLS primitives (`crypto`),
//! - the verifiable delay function day counter (`vdf`),
//! - canonical state storage (`storage`),
//! - reliable broadcast and binary Byzantine agreement (`rbc`, `bba`),
//! - the common-coin building block BBA's coin round depends on (`coin`),
//! - asynchronous common subset built on RBC + BBA (`acs`),
//! - the epoch orchestrator and canonical ordering (`orchestrator`),
//! - day advancement and validator-set membership changes (`day`),
//! - Byzantine evidence and blacklist voting (`detection`),
//! - the upward interface boundary (`boundary`),
//! - peer wire format and gossip envelopes (`peer`),
//! - retry backoff and circuit breaking (`retry`),
//! - Prometheus-based metrics (`metrics`),
//! - the crate-level error kind (`error`),
//! - and top-level node configuration (`config`).
//!
//! Higher-level binaries compose these pieces into validator nodes.

pub mod acs;
pub mod bba;
pub mod boundary;
pub mod coin;
pub mod config;
pub mod crypto;
pub mod day;
pub mod detection;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod peer;
pub mod rbc;
pub mod retry;
pub mod storage;
pub mod types;
pub mod vdf;

pub use config::ConductorConfig;
pub use error::ConductorError;

pub use acs::{AcsError, AcsInstance};
pub use boundary::{BoundaryAdapter, BoundaryError, CallerIdentity, ConsensusStatus};
pub use day::{DayAdvancementError, DayAdvancementTracker, MembershipChange, MembershipError};
pub use detection::{BlacklistBallot, BlacklistError, EvidenceRecord};
pub use metrics::{run_prometheus_http_server, ConductorMetrics, MetricsRegistry};
pub use orchestrator::{recover_next_epoch, EpochError, EpochOrchestrator, EpochState};
pub use storage::{ConductorStore, InMemoryStore, RocksDbConfig, RocksDbStore, StorageError};

// Re-export domain types at the crate root for convenience.
pub use types::*;
