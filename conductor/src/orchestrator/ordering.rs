//! Canonical ordering of an epoch's agreed proposals into a [`Block`]
//! (§4.6): decode each accepted payload back into an [`EventBatch`],
//! union their event fingerprints, sort and dedupe, and bind the result
//! to a Merkle root.

use std::collections::{BTreeMap, BTreeSet};

use crate::crypto::hash::merkle_root_of;
use crate::types::{Block, EventBatch, EventFingerprint, Hash256, QuorumCertificate, ValidatorId};

#[derive(Debug)]
pub enum OrderingError {
    /// A payload the ACS instance accepted did not decode as a canonical
    /// `EventBatch`.
    MalformedBatch { proposer: usize },
    /// A decoded batch's `epoch` does not match the epoch being ordered.
    EpochMismatch { proposer: usize, expected: u64, actual: u64 },
}

impl std::fmt::Display for OrderingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderingError::MalformedBatch { proposer } => {
                write!(f, "proposer {proposer}'s accepted payload is not a valid event batch")
            }
            OrderingError::EpochMismatch { proposer, expected, actual } => write!(
                f,
                "proposer {proposer}'s batch claims epoch {actual}, expected {expected}"
            ),
        }
    }
}

impl std::error::Error for OrderingError {}

fn decode_batch(payload: &[u8], proposer: usize, epoch: u64) -> Result<EventBatch, OrderingError> {
    let cfg = bincode::config::standard();
    let (batch, _): (EventBatch, usize) = bincode::serde::decode_from_slice(payload, cfg)
        .map_err(|_| OrderingError::MalformedBatch { proposer })?;
    if batch.epoch != epoch {
        return Err(OrderingError::EpochMismatch {
            proposer,
            expected: epoch,
            actual: batch.epoch,
        });
    }
    Ok(batch)
}

/// Sorts and deduplicates fingerprints from across every accepted batch.
/// `EventFingerprint`'s `Ord` is the only ordering relation used, so the
/// result is identical across every honest party regardless of arrival
/// order (§8 property 3, canonical ordering).
pub fn sort_unique(batches: &[EventBatch]) -> Vec<EventFingerprint> {
    let set: BTreeSet<EventFingerprint> = batches.iter().flat_map(|b| b.events.iter().copied()).collect();
    set.into_iter().collect()
}

/// Builds the finalized [`Block`] for `epoch` from the ACS-selected
/// subset: `subset` maps proposer index to its accepted RBC payload, and
/// `proposer_ids` resolves each index to a [`ValidatorId`] via the epoch's
/// validator-set snapshot. The QC is assembled by the caller over
/// [`Block::digest`] and supplied here.
pub fn build_block(
    epoch: u64,
    subset: &BTreeMap<usize, Vec<u8>>,
    proposer_ids: impl Fn(usize) -> ValidatorId,
    quorum_certificate: QuorumCertificate,
) -> Result<Block, OrderingError> {
    let mut batches = Vec::with_capacity(subset.len());
    let mut proposer_set = BTreeSet::new();
    for (&proposer, payload) in subset {
        let batch = decode_batch(payload, proposer, epoch)?;
        proposer_set.insert(proposer_ids(proposer));
        batches.push(batch);
    }
    let events = sort_unique(&batches);
    let merkle_root = merkle_root_of(&events.iter().map(|e| e.0).collect::<Vec<Hash256>>());
    Ok(Block {
        epoch,
        events,
        merkle_root,
        proposer_set,
        quorum_certificate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignerBitmap;

    fn fp(byte: u8) -> EventFingerprint {
        EventFingerprint(Hash256([byte; 32]))
    }

    fn dummy_qc() -> QuorumCertificate {
        QuorumCertificate {
            message_digest: Hash256::zero(),
            aggregate_signature: vec![],
            signer_set: SignerBitmap::new(4),
        }
    }

    #[test]
    fn sort_unique_dedupes_across_batches() {
        let proposer = ValidatorId(Hash256([1u8; 32]));
        let a = EventBatch::new(proposer, 1, vec![fp(3), fp(1)], 0);
        let b = EventBatch::new(proposer, 1, vec![fp(1), fp(2)], 1);
        let result = sort_unique(&[a, b]);
        assert_eq!(result, vec![fp(1), fp(2), fp(3)]);
    }

    #[test]
    fn build_block_decodes_and_orders_accepted_payloads() {
        let epoch = 7;
        let proposer_a = ValidatorId(Hash256([1u8; 32]));
        let proposer_b = ValidatorId(Hash256([2u8; 32]));
        let batch_a = EventBatch::new(proposer_a, epoch, vec![fp(2), fp(1)], 0);
        let batch_b = EventBatch::new(proposer_b, epoch, vec![fp(1), fp(4)], 1);

        let cfg = bincode::config::standard();
        let mut subset = BTreeMap::new();
        subset.insert(0usize, bincode::serde::encode_to_vec(&batch_a, cfg).unwrap());
        subset.insert(1usize, bincode::serde::encode_to_vec(&batch_b, cfg).unwrap());

        let ids = [proposer_a, proposer_b];
        let block = build_block(epoch, &subset, |i| ids[i], dummy_qc()).expect("valid batches");
        assert_eq!(block.events, vec![fp(1), fp(2), fp(4)]);
        assert_eq!(block.proposer_set.len(), 2);
    }

    #[test]
    fn build_block_rejects_epoch_mismatch() {
        let proposer = ValidatorId(Hash256([1u8; 32]));
        let batch = EventBatch::new(proposer, 5, vec![fp(1)], 0);
        let cfg = bincode::config::standard();
        let mut subset = BTreeMap::new();
        subset.insert(0usize, bincode::serde::encode_to_vec(&batch, cfg).unwrap());

        let result = build_block(6, &subset, |_| proposer, dummy_qc());
        assert!(matches!(result, Err(OrderingError::EpochMismatch { .. })));
    }
}
