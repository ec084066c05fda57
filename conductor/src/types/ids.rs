//! Fixed-width identifiers and the day/epoch counters.
//!
//! `Hash256` is the configured cryptographic hash (BLAKE3-256) used for
//! both content addressing and the VDF chain. Everything else in this
//! module is a newtype over it or over a plain integer, so that "naked"
//! byte buffers and raw `u64`s never leak into consensus-level APIs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Length in bytes of every 256-bit hash used in this crate.
pub const HASH_LEN: usize = 32;

/// 256-bit BLAKE3 digest, used for content addressing and the VDF chain.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// Computes the BLAKE3-256 digest of `data`.
    pub fn compute(data: &[u8]) -> Self {
        Hash256(*blake3::hash(data).as_bytes())
    }

    /// Computes the digest of the concatenation of several byte slices,
    /// without an intermediate allocation of the full preimage.
    pub fn compute_concat(parts: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(part);
        }
        Hash256(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    pub fn zero() -> Self {
        Hash256([0u8; HASH_LEN])
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", hex::encode(self.0))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Identity of a validator: the hash of its long-lived public key.
///
/// Assigned once at join time and never reused, even if a validator
/// later rejoins under the same key (membership-change bookkeeping in
/// [`crate::day::membership`] treats a rejoin as a fresh join epoch).
#[derive(Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ValidatorId(pub Hash256);

impl ValidatorId {
    pub fn from_public_key(pk_bytes: &[u8]) -> Self {
        ValidatorId(Hash256::compute(pk_bytes))
    }
}

impl fmt::Debug for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidatorId({})", self.0)
    }
}

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Consensus epoch: numerically equal to the current day number. One
/// agreement instance (RBC + BBA + ACS + commit) spans exactly one epoch.
pub type Epoch = u64;

/// Monotonically non-decreasing day counter. Zero at genesis; has no
/// calendar meaning (see GLOSSARY).
pub type DayNumber = u64;

/// Hash of an externally-owned event payload. The core never dereferences
/// the payload itself; only the fingerprint traverses consensus.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct EventFingerprint(pub Hash256);

impl fmt::Debug for EventFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventFingerprint({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash256_compute_is_deterministic() {
        let a = Hash256::compute(b"conductor");
        let b = Hash256::compute(b"conductor");
        assert_eq!(a, b);
    }

    #[test]
    fn compute_concat_matches_manual_concatenation() {
        let concat = Hash256::compute(b"day-seed42genesis");
        let split = Hash256::compute_concat(&[b"day-seed", b"42", b"genesis"]);
        assert_eq!(concat, split);
    }

    #[test]
    fn validator_id_is_stable_for_same_key() {
        let pk = [7u8; 32];
        assert_eq!(
            ValidatorId::from_public_key(&pk),
            ValidatorId::from_public_key(&pk)
        );
    }
}
