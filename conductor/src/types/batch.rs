//! Event batches submitted by proposers into a single RBC instance.

use serde::{Deserialize, Serialize};

use super::ids::{Epoch, EventFingerprint, ValidatorId};

/// Default cap on the number of fingerprints in a single batch.
pub const DEFAULT_MAX_EVENTS: usize = 4096;
/// Default cap on the serialized size of a single batch, in bytes.
pub const DEFAULT_MAX_BATCH_BYTES: usize = 1024 * 1024;

/// A proposer's candidate contribution to an epoch's agreement round.
///
/// `batch_nonce` is a 128-bit value chosen by the proposer; it has no
/// consensus meaning beyond disambiguating otherwise-identical batches
/// and is not itself ordered against anything (see canonical ordering in
/// [`crate::orchestrator::ordering`], which only ever sorts event
/// fingerprints).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventBatch {
    pub proposer: ValidatorId,
    pub epoch: Epoch,
    pub events: Vec<EventFingerprint>,
    pub batch_nonce: u128,
}

/// Errors that can occur while constructing or accepting a batch.
#[derive(Debug)]
pub enum BatchError {
    TooManyEvents { max: usize, actual: usize },
    TooLarge { max: usize, actual: usize },
}

impl std::fmt::Display for BatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchError::TooManyEvents { max, actual } => {
                write!(f, "batch has {actual} events, exceeds max {max}")
            }
            BatchError::TooLarge { max, actual } => {
                write!(f, "batch is {actual} bytes, exceeds max {max}")
            }
        }
    }
}

impl std::error::Error for BatchError {}

impl EventBatch {
    pub fn new(
        proposer: ValidatorId,
        epoch: Epoch,
        events: Vec<EventFingerprint>,
        batch_nonce: u128,
    ) -> Self {
        Self {
            proposer,
            epoch,
            events,
            batch_nonce,
        }
    }

    /// Canonical bincode-2 encoding of this batch; the preimage of the
    /// RBC `batch_digest` and the unit erasure-coded for dissemination.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let cfg = bincode::config::standard();
        bincode::serde::encode_to_vec(self, cfg)
            .expect("EventBatch must always be serializable")
    }

    pub fn digest(&self) -> super::ids::Hash256 {
        super::ids::Hash256::compute(&self.canonical_bytes())
    }

    /// Validates the batch against size limits configured by the node.
    pub fn check_bounds(&self, max_events: usize, max_bytes: usize) -> Result<(), BatchError> {
        if self.events.len() > max_events {
            return Err(BatchError::TooManyEvents {
                max: max_events,
                actual: self.events.len(),
            });
        }
        let size = self.canonical_bytes().len();
        if size > max_bytes {
            return Err(BatchError::TooLarge {
                max: max_bytes,
                actual: size,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ids::Hash256;

    fn fp(byte: u8) -> EventFingerprint {
        EventFingerprint(Hash256([byte; 32]))
    }

    #[test]
    fn digest_is_stable_for_identical_batches() {
        let proposer = ValidatorId(Hash256([1u8; 32]));
        let a = EventBatch::new(proposer, 1, vec![fp(1), fp(2)], 42);
        let b = EventBatch::new(proposer, 1, vec![fp(1), fp(2)], 42);
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn check_bounds_rejects_too_many_events() {
        let proposer = ValidatorId(Hash256([1u8; 32]));
        let batch = EventBatch::new(proposer, 1, vec![fp(1); 10], 0);
        assert!(batch.check_bounds(5, DEFAULT_MAX_BATCH_BYTES).is_err());
        assert!(batch.check_bounds(10, DEFAULT_MAX_BATCH_BYTES).is_ok());
    }
}
