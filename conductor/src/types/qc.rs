//! Quorum certificates and the signer bitmap they carry.

use serde::{Deserialize, Serialize};

use super::ids::Hash256;

/// Bitmap over validator indices in the active set for a given epoch,
/// ordered by join-epoch then by [`super::ids::ValidatorId`] bytes for
/// same-epoch joins (see SPEC_FULL.md §D.3).
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SignerBitmap {
    bits: Vec<u8>,
    len: usize,
}

impl SignerBitmap {
    pub fn new(len: usize) -> Self {
        Self {
            bits: vec![0u8; len.div_ceil(8)],
            len,
        }
    }

    pub fn set(&mut self, index: usize) {
        assert!(index < self.len, "signer index out of range");
        self.bits[index / 8] |= 1 << (index % 8);
    }

    pub fn is_set(&self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        self.bits[index / 8] & (1 << (index % 8)) != 0
    }

    pub fn popcount(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    pub fn indices(&self) -> Vec<usize> {
        (0..self.len).filter(|i| self.is_set(*i)).collect()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A threshold-aggregated signature proving that at least `2f+1`
/// validators (active at the time the message was signed) endorsed
/// `message_digest`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuorumCertificate {
    pub message_digest: Hash256,
    pub aggregate_signature: Vec<u8>,
    pub signer_set: SignerBitmap,
}

impl QuorumCertificate {
    /// `true` iff the signer bitmap's popcount meets `2f+1` for the given
    /// `n`/`f`. Signature validity itself is checked separately via
    /// [`crate::crypto::threshold::ThresholdContext::verify_aggregate`].
    pub fn has_quorum(&self, f: usize) -> bool {
        self.signer_set.popcount() >= 2 * f + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_popcount_tracks_set_bits() {
        let mut bm = SignerBitmap::new(10);
        bm.set(0);
        bm.set(3);
        bm.set(9);
        assert_eq!(bm.popcount(), 3);
        assert_eq!(bm.indices(), vec![0, 3, 9]);
    }

    #[test]
    fn quorum_boundary_2f_plus_1_vs_2f() {
        // n=4, f=1: 2f+1 = 3 must satisfy; 2f = 2 must not.
        let mut three = SignerBitmap::new(4);
        three.set(0);
        three.set(1);
        three.set(2);
        let qc_three = QuorumCertificate {
            message_digest: Hash256::zero(),
            aggregate_signature: vec![],
            signer_set: three,
        };
        assert!(qc_three.has_quorum(1));

        let mut two = SignerBitmap::new(4);
        two.set(0);
        two.set(1);
        let qc_two = QuorumCertificate {
            message_digest: Hash256::zero(),
            aggregate_signature: vec![],
            signer_set: two,
        };
        assert!(!qc_two.has_quorum(1));
    }
}
