//! Day proofs produced by the VDF engine and their canonical (QC'd) form.

use serde::{Deserialize, Serialize};

use super::ids::{DayNumber, Hash256, ValidatorId};
use super::qc::QuorumCertificate;

/// A single validator's claim about the VDF output for a given day.
///
/// `seed` is deterministic from `day_number` and the genesis seed (see
/// [`crate::vdf::engine::derive_seed`]); `output` is the result of
/// `difficulty` sequential hash applications starting from `seed`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DayProof {
    pub day_number: DayNumber,
    pub seed: [u8; 32],
    pub difficulty: u64,
    pub output: [u8; 32],
    pub proposer: ValidatorId,
    pub proposer_signature: Vec<u8>,
}

impl DayProof {
    /// Canonical bytes signed by the proposer and hashed into the message
    /// digest the threshold signature shares and QC are computed over.
    /// The signature itself is excluded from the preimage.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let cfg = bincode::config::standard();
        #[derive(Serialize)]
        struct Unsigned<'a> {
            day_number: DayNumber,
            seed: [u8; 32],
            difficulty: u64,
            output: [u8; 32],
            proposer: &'a ValidatorId,
        }
        let unsigned = Unsigned {
            day_number: self.day_number,
            seed: self.seed,
            difficulty: self.difficulty,
            output: self.output,
            proposer: &self.proposer,
        };
        bincode::serde::encode_to_vec(&unsigned, cfg).expect("DayProof must be serializable")
    }

    pub fn digest(&self) -> Hash256 {
        Hash256::compute(&self.signing_bytes())
    }
}

/// A [`DayProof`] that has received a quorum certificate from `2f+1`
/// validators reporting the identical `output`, and is therefore
/// eligible to advance the finalized day number.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CanonicalDayProof {
    pub day_proof: DayProof,
    pub quorum_certificate: QuorumCertificate,
}

impl CanonicalDayProof {
    pub fn day_number(&self) -> DayNumber {
        self.day_proof.day_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_bytes_excludes_signature() {
        let proposer = ValidatorId(Hash256([1u8; 32]));
        let mut p1 = DayProof {
            day_number: 1,
            seed: [2u8; 32],
            difficulty: 1000,
            output: [3u8; 32],
            proposer,
            proposer_signature: vec![9, 9, 9],
        };
        let p2_bytes = p1.signing_bytes();
        p1.proposer_signature = vec![1, 2, 3, 4, 5];
        assert_eq!(p1.signing_bytes(), p2_bytes);
    }
}
