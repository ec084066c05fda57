//! Binds erasure-coded fragments to a single Merkle root so that an Echo
//! or Ready carrying a fragment can be checked against the value the
//! sender originally proposed, without exchanging the whole payload.

use crate::crypto::hash::{merkle_proof_for, merkle_root_of, merkle_verify, MerkleProof};
use crate::types::Hash256;

fn shard_digest(shard: &[u8]) -> Hash256 {
    Hash256::compute(shard)
}

/// Computes the Merkle root over every fragment's content digest.
pub fn fragment_root(shards: &[Vec<u8>]) -> Hash256 {
    let leaves: Vec<Hash256> = shards.iter().map(|s| shard_digest(s)).collect();
    merkle_root_of(&leaves)
}

/// Builds the inclusion proof binding `shards[index]` to the root
/// produced by [`fragment_root`] over the same `shards`.
pub fn fragment_proof(shards: &[Vec<u8>], index: usize) -> Option<MerkleProof> {
    let leaves: Vec<Hash256> = shards.iter().map(|s| shard_digest(s)).collect();
    merkle_proof_for(&leaves, index)
}

/// Checks that `shard` is the fragment committed to at its claimed
/// position under `root`.
pub fn verify_fragment(shard: &[u8], proof: &MerkleProof, root: &Hash256) -> bool {
    merkle_verify(&shard_digest(shard), proof, root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_fragment_verifies_against_the_shared_root() {
        let shards = vec![vec![1, 2], vec![3, 4], vec![5, 6], vec![7, 8]];
        let root = fragment_root(&shards);
        for (i, shard) in shards.iter().enumerate() {
            let proof = fragment_proof(&shards, i).expect("proof exists");
            assert!(verify_fragment(shard, &proof, &root));
        }
    }

    #[test]
    fn tampered_fragment_fails_verification() {
        let shards = vec![vec![1, 2], vec![3, 4], vec![5, 6]];
        let root = fragment_root(&shards);
        let proof = fragment_proof(&shards, 0).expect("proof exists");
        assert!(!verify_fragment(&[9, 9], &proof, &root));
    }
}
