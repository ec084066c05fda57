//! Upward interface to the federation relay layer (§6 "Upward"): the only
//! surface external callers see. Every call authenticates against a
//! configured trust anchor before touching consensus state.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::storage::{ConductorStore, StorageError};
use crate::types::{Block, CanonicalDayProof, DayNumber, Epoch, EventFingerprint, Hash256};

pub const DEFAULT_IDEMPOTENCY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug)]
pub enum BoundaryError {
    Unauthenticated,
    PermissionDenied,
    TooManyEvents { max: usize, actual: usize },
    TooLarge { max: usize, actual: usize },
    Storage(StorageError),
}

impl std::fmt::Display for BoundaryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BoundaryError::Unauthenticated => write!(f, "caller is not authenticated"),
            BoundaryError::PermissionDenied => write!(f, "caller is not authorized for this call"),
            BoundaryError::TooManyEvents { max, actual } => {
                write!(f, "batch has {actual} events, exceeds max {max}")
            }
            BoundaryError::TooLarge { max, actual } => write!(f, "batch is {actual} bytes, exceeds max {max}"),
            BoundaryError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for BoundaryError {}

impl From<StorageError> for BoundaryError {
    fn from(e: StorageError) -> Self {
        BoundaryError::Storage(e)
    }
}

/// The caller's authentication/authorization result for one call, checked
/// before anything else (§6: "unauthenticated or unauthorized callers
/// receive `UNAUTHENTICATED` / `PERMISSION_DENIED`").
pub struct CallerIdentity {
    pub authenticated: bool,
    pub authorized: bool,
}

fn check_identity(identity: &CallerIdentity) -> Result<(), BoundaryError> {
    if !identity.authenticated {
        return Err(BoundaryError::Unauthenticated);
    }
    if !identity.authorized {
        return Err(BoundaryError::PermissionDenied);
    }
    Ok(())
}

/// Outcome of polling `get_consensus_status` for a submitted batch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConsensusStatus {
    Pending,
    Committed { epoch: Epoch, block_digest: Hash256 },
    Failed { reason: String },
}

/// The boundary adapter: tracks idempotent batch submission and
/// consensus-status lookups. Durable record-of-truth state (blocks, day
/// proofs) is read straight through to the [`ConductorStore`]; batch
/// status is adapter-local and intentionally volatile, same rationale as
/// [`crate::storage::cache::SeenMessageCache`].
pub struct BoundaryAdapter {
    idempotency: DashMap<Vec<u8>, (Hash256, Instant)>,
    idempotency_ttl: Duration,
    statuses: DashMap<Hash256, ConsensusStatus>,
}

impl BoundaryAdapter {
    pub fn new(idempotency_ttl: Duration) -> Self {
        Self {
            idempotency: DashMap::new(),
            idempotency_ttl,
            statuses: DashMap::new(),
        }
    }

    /// Accepts a batch submission, returning a `batch_id` that is stable
    /// across retries of the same `idempotency_key` within the TTL window
    /// (§6: "idempotent per `idempotency_key` within a 24-hour TTL").
    pub fn submit_event_batch(
        &self,
        identity: &CallerIdentity,
        events: &[EventFingerprint],
        batch_nonce: u128,
        idempotency_key: &[u8],
        max_events: usize,
        max_bytes: usize,
    ) -> Result<Hash256, BoundaryError> {
        check_identity(identity)?;

        if let Some(entry) = self.idempotency.get(idempotency_key) {
            let (batch_id, inserted_at) = *entry;
            if inserted_at.elapsed() <= self.idempotency_ttl {
                return Ok(batch_id);
            }
        }

        if events.len() > max_events {
            return Err(BoundaryError::TooManyEvents {
                max: max_events,
                actual: events.len(),
            });
        }
        let cfg = bincode::config::standard();
        let encoded = bincode::serde::encode_to_vec((events, batch_nonce), cfg).expect("must serialize");
        if encoded.len() > max_bytes {
            return Err(BoundaryError::TooLarge {
                max: max_bytes,
                actual: encoded.len(),
            });
        }

        let batch_id = Hash256::compute(&encoded);
        self.idempotency.insert(idempotency_key.to_vec(), (batch_id, Instant::now()));
        self.statuses.insert(batch_id, ConsensusStatus::Pending);
        Ok(batch_id)
    }

    pub fn get_day_proof(
        &self,
        identity: &CallerIdentity,
        store: &dyn ConductorStore,
        day: DayNumber,
    ) -> Result<Option<CanonicalDayProof>, BoundaryError> {
        check_identity(identity)?;
        Ok(store.get_day_proof(day)?)
    }

    pub fn get_block(
        &self,
        identity: &CallerIdentity,
        store: &dyn ConductorStore,
        epoch: Epoch,
    ) -> Result<Option<Block>, BoundaryError> {
        check_identity(identity)?;
        Ok(store.get_block(epoch)?)
    }

    pub fn get_consensus_status(
        &self,
        identity: &CallerIdentity,
        batch_id: Hash256,
    ) -> Result<ConsensusStatus, BoundaryError> {
        check_identity(identity)?;
        Ok(self.statuses.get(&batch_id).map(|s| s.clone()).unwrap_or(ConsensusStatus::Pending))
    }

    /// Called by the orchestrator once a block containing `batch_id`
    /// commits.
    pub fn record_committed(&self, batch_id: Hash256, epoch: Epoch, block_digest: Hash256) {
        self.statuses.insert(batch_id, ConsensusStatus::Committed { epoch, block_digest });
    }

    /// Called once the epoch timeout budget for `batch_id` is exhausted
    /// (§7 `ConsensusTimeout`: "then `FAILED(timeout)`").
    pub fn record_failed(&self, batch_id: Hash256, reason: impl Into<String>) {
        self.statuses.insert(batch_id, ConsensusStatus::Failed { reason: reason.into() });
    }
}

impl Default for BoundaryAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_IDEMPOTENCY_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use crate::types::Hash256 as H;

    fn granted() -> CallerIdentity {
        CallerIdentity { authenticated: true, authorized: true }
    }

    fn fp(byte: u8) -> EventFingerprint {
        EventFingerprint(H([byte; 32]))
    }

    #[test]
    fn unauthenticated_caller_is_rejected_before_anything_else() {
        let adapter = BoundaryAdapter::default();
        let identity = CallerIdentity { authenticated: false, authorized: true };
        let result = adapter.submit_event_batch(&identity, &[fp(1)], 0, b"key", 10, 1024);
        assert!(matches!(result, Err(BoundaryError::Unauthenticated)));
    }

    #[test]
    fn unauthorized_caller_is_rejected() {
        let adapter = BoundaryAdapter::default();
        let identity = CallerIdentity { authenticated: true, authorized: false };
        let store = InMemoryStore::new();
        let result = adapter.get_block(&identity, &store, 0);
        assert!(matches!(result, Err(BoundaryError::PermissionDenied)));
    }

    #[test]
    fn repeated_submission_with_same_idempotency_key_returns_same_batch_id() {
        let adapter = BoundaryAdapter::default();
        let identity = granted();
        let first = adapter.submit_event_batch(&identity, &[fp(1)], 0, b"key-1", 10, 1024).unwrap();
        let second = adapter.submit_event_batch(&identity, &[fp(2)], 1, b"key-1", 10, 1024).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn submission_exceeding_event_count_is_rejected() {
        let adapter = BoundaryAdapter::default();
        let identity = granted();
        let events: Vec<_> = (0..5).map(fp).collect();
        let result = adapter.submit_event_batch(&identity, &events, 0, b"key-2", 3, 1024);
        assert!(matches!(result, Err(BoundaryError::TooManyEvents { .. })));
    }

    #[test]
    fn consensus_status_transitions_from_pending_to_committed() {
        let adapter = BoundaryAdapter::default();
        let identity = granted();
        let batch_id = adapter.submit_event_batch(&identity, &[fp(1)], 0, b"key-3", 10, 1024).unwrap();
        assert_eq!(adapter.get_consensus_status(&identity, batch_id).unwrap(), ConsensusStatus::Pending);

        adapter.record_committed(batch_id, 7, H::zero());
        assert_eq!(
            adapter.get_consensus_status(&identity, batch_id).unwrap(),
            ConsensusStatus::Committed { epoch: 7, block_digest: H::zero() }
        );
    }

    #[test]
    fn get_day_proof_reads_through_to_store() {
        let adapter = BoundaryAdapter::default();
        let identity = granted();
        let store = InMemoryStore::new();
        let result = adapter.get_day_proof(&identity, &store, 3).unwrap();
        assert!(result.is_none());
    }
}
