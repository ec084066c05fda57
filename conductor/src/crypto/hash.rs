//! Sequential hashing and Merkle-tree helpers built on BLAKE3-256.
//!
//! The VDF chain and RBC's fragment binding both reduce to repeated or
//! structured applications of the same primitive, so the core loop lives
//! here once and is reused by [`crate::vdf::engine`] and [`crate::rbc`].

use crate::types::ids::Hash256;

const LEAF_DOMAIN: &[u8] = b"conductor-merkle-leaf";
const NODE_DOMAIN: &[u8] = b"conductor-merkle-node";

/// Applies BLAKE3 `iterations` times sequentially, starting from `seed`.
/// This is the core VDF chain: deterministic, side-effect free, and
/// cannot be parallelized by construction (each step depends on the
/// previous digest).
pub fn sequential_hash(seed: &[u8; 32], iterations: u64) -> [u8; 32] {
    let mut current = *seed;
    for _ in 0..iterations {
        current = *blake3::hash(&current).as_bytes();
    }
    current
}

/// Same as [`sequential_hash`] but invokes `on_progress` every
/// `progress_interval` iterations and stops early if it returns `false`,
/// for cooperative cancellation (see [`crate::vdf::engine::compute`]).
pub fn sequential_hash_with_progress<F>(
    seed: &[u8; 32],
    iterations: u64,
    progress_interval: u64,
    mut on_progress: F,
) -> Option<[u8; 32]>
where
    F: FnMut(u64) -> bool,
{
    let mut current = *seed;
    let interval = progress_interval.max(1);
    for i in 0..iterations {
        current = *blake3::hash(&current).as_bytes();
        if (i + 1) % interval == 0 && !on_progress(i + 1) {
            return None;
        }
    }
    Some(current)
}

fn hash_leaf(data: &[u8]) -> Hash256 {
    Hash256::compute_concat(&[LEAF_DOMAIN, data])
}

fn hash_node(left: &Hash256, right: &Hash256) -> Hash256 {
    Hash256::compute_concat(&[NODE_DOMAIN, &left.0, &right.0])
}

/// Computes the Merkle root over `leaves` (each hashed with a leaf domain
/// tag before combining). An odd node at any level is promoted unchanged
/// rather than duplicated, so fragment counts need not be a power of two.
pub fn merkle_root_of(leaves: &[Hash256]) -> Hash256 {
    if leaves.is_empty() {
        return Hash256::zero();
    }
    let mut level: Vec<Hash256> = leaves.iter().map(|l| hash_leaf(&l.0)).collect();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        let mut iter = level.chunks(2);
        while let Some(pair) = iter.next() {
            if pair.len() == 2 {
                next.push(hash_node(&pair[0], &pair[1]));
            } else {
                next.push(pair[0]);
            }
        }
        level = next;
    }
    level[0]
}

/// A Merkle inclusion proof: the sibling hash at each level from leaf to
/// root, plus whether the sibling is on the left.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MerkleProof {
    pub siblings: Vec<(Hash256, bool)>,
}

/// Builds the inclusion proof for `index` among `leaves`.
pub fn merkle_proof_for(leaves: &[Hash256], index: usize) -> Option<MerkleProof> {
    if index >= leaves.len() {
        return None;
    }
    let mut siblings = Vec::new();
    let mut level: Vec<Hash256> = leaves.iter().map(|l| hash_leaf(&l.0)).collect();
    let mut idx = index;
    while level.len() > 1 {
        let is_right = idx % 2 == 1;
        let sibling_idx = if is_right { idx - 1 } else { idx + 1 };
        if sibling_idx < level.len() {
            siblings.push((level[sibling_idx], !is_right));
        }
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        let mut i = 0;
        while i < level.len() {
            if i + 1 < level.len() {
                next.push(hash_node(&level[i], &level[i + 1]));
            } else {
                next.push(level[i]);
            }
            i += 2;
        }
        level = next;
        idx /= 2;
    }
    Some(MerkleProof { siblings })
}

/// Verifies that `leaf` at the position implied by `proof` combines to
/// `root`. `proof` entries carry `(sibling_hash, sibling_is_left)`.
pub fn merkle_verify(leaf: &Hash256, proof: &MerkleProof, root: &Hash256) -> bool {
    let mut current = hash_leaf(&leaf.0);
    for (sibling, sibling_is_left) in &proof.siblings {
        current = if *sibling_is_left {
            hash_node(sibling, &current)
        } else {
            hash_node(&current, sibling)
        };
    }
    current == *root
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_hash_is_deterministic() {
        let seed = [7u8; 32];
        assert_eq!(sequential_hash(&seed, 1000), sequential_hash(&seed, 1000));
    }

    #[test]
    fn sequential_hash_with_progress_matches_plain() {
        let seed = [3u8; 32];
        let plain = sequential_hash(&seed, 2500);
        let progressive =
            sequential_hash_with_progress(&seed, 2500, 100, |_| true).expect("not cancelled");
        assert_eq!(plain, progressive);
    }

    #[test]
    fn cancellation_stops_early() {
        let seed = [1u8; 32];
        let result = sequential_hash_with_progress(&seed, 10_000, 10, |done| done < 50);
        assert!(result.is_none());
    }

    #[test]
    fn merkle_proof_roundtrips_for_every_leaf() {
        let leaves: Vec<Hash256> = (0..7u8).map(|b| Hash256([b; 32])).collect();
        let root = merkle_root_of(&leaves);
        for (i, leaf) in leaves.iter().enumerate() {
            let proof = merkle_proof_for(&leaves, i).expect("proof exists");
            assert!(merkle_verify(leaf, &proof, &root));
        }
    }

    #[test]
    fn merkle_verify_rejects_wrong_leaf() {
        let leaves: Vec<Hash256> = (0..4u8).map(|b| Hash256([b; 32])).collect();
        let root = merkle_root_of(&leaves);
        let proof = merkle_proof_for(&leaves, 0).expect("proof exists");
        let wrong_leaf = Hash256([99u8; 32]);
        assert!(!merkle_verify(&wrong_leaf, &proof, &root));
    }
}
