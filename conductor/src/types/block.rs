//! Finalized blocks: the committed output of one epoch's agreement.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::ids::{Epoch, EventFingerprint, Hash256, ValidatorId};
use super::qc::QuorumCertificate;

/// Strongly-typed block hash, the BLAKE3-256 digest of [`Block::canonical_bytes`].
#[derive(Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BlockHash(pub Hash256);

impl std::fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BlockHash({})", self.0)
    }
}

/// A finalized block: the ordered, deduplicated union of every proposal
/// the epoch's ACS instance accepted, plus the quorum certificate over
/// its digest. Once persisted under key `(epoch)` it is immutable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub epoch: Epoch,
    pub events: Vec<EventFingerprint>,
    pub merkle_root: Hash256,
    pub proposer_set: BTreeSet<ValidatorId>,
    pub quorum_certificate: QuorumCertificate,
}

impl Block {
    /// Bytes hashed/signed for this block; excludes the QC itself so the
    /// QC can be assembled over a stable digest.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let cfg = bincode::config::standard();
        #[derive(Serialize)]
        struct Unsigned<'a> {
            epoch: Epoch,
            events: &'a [EventFingerprint],
            merkle_root: Hash256,
            proposer_set: &'a BTreeSet<ValidatorId>,
        }
        let unsigned = Unsigned {
            epoch: self.epoch,
            events: &self.events,
            merkle_root: self.merkle_root,
            proposer_set: &self.proposer_set,
        };
        bincode::serde::encode_to_vec(&unsigned, cfg).expect("Block must be serializable")
    }

    pub fn digest(&self) -> Hash256 {
        Hash256::compute(&self.signing_bytes())
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        let cfg = bincode::config::standard();
        bincode::serde::encode_to_vec(self, cfg).expect("Block must be serializable")
    }

    pub fn hash(&self) -> BlockHash {
        BlockHash(Hash256::compute(&self.canonical_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash::merkle_root_of;
    use crate::types::qc::SignerBitmap;

    fn fp(byte: u8) -> EventFingerprint {
        EventFingerprint(Hash256([byte; 32]))
    }

    #[test]
    fn digest_excludes_quorum_certificate() {
        let events = vec![fp(1), fp(2)];
        let root = merkle_root_of(&events.iter().map(|e| e.0).collect::<Vec<_>>());
        let proposer_set = BTreeSet::from([ValidatorId(Hash256([1u8; 32]))]);

        let mut block = Block {
            epoch: 5,
            events,
            merkle_root: root,
            proposer_set,
            quorum_certificate: QuorumCertificate {
                message_digest: Hash256::zero(),
                aggregate_signature: vec![1, 2, 3],
                signer_set: SignerBitmap::new(4),
            },
        };
        let digest = block.digest();
        block.quorum_certificate.aggregate_signature = vec![9, 9, 9, 9];
        assert_eq!(block.digest(), digest);
    }
}
