//! Upward interface boundary (§6).

pub mod adapters;

pub use adapters::{BoundaryAdapter, BoundaryError, CallerIdentity, ConsensusStatus, DEFAULT_IDEMPOTENCY_TTL};
