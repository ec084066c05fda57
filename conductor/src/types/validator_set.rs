//! Active validator set snapshots (`validator_set/{day}`, §4.9).
//!
//! The signer bitmap in a [`crate::types::QuorumCertificate`] is indexed
//! against the ordering defined here: by `join_epoch`, ties broken by
//! `ValidatorId` byte order (Open Question resolved in SPEC_FULL.md §D.3).

use serde::{Deserialize, Serialize};

use super::ids::{DayNumber, Epoch, ValidatorId};

/// One member of an active validator set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorMember {
    pub validator_id: ValidatorId,
    pub join_epoch: Epoch,
    pub public_key_bytes: Vec<u8>,
}

/// The canonical active set as of a given day, in signer-bitmap order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSet {
    pub day: DayNumber,
    members: Vec<ValidatorMember>,
}

impl ValidatorSet {
    /// Builds a validator set, sorting members into canonical signer-bitmap
    /// order: ascending `join_epoch`, ties broken by `ValidatorId` bytes.
    pub fn new(day: DayNumber, mut members: Vec<ValidatorMember>) -> Self {
        members.sort_by(|a, b| {
            a.join_epoch
                .cmp(&b.join_epoch)
                .then_with(|| a.validator_id.0.as_bytes().cmp(b.validator_id.0.as_bytes()))
        });
        Self { day, members }
    }

    pub fn members(&self) -> &[ValidatorMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Index of `id` in signer-bitmap order, if present in the set.
    pub fn index_of(&self, id: &ValidatorId) -> Option<usize> {
        self.members.iter().position(|m| &m.validator_id == id)
    }

    pub fn contains(&self, id: &ValidatorId) -> bool {
        self.index_of(id).is_some()
    }

    /// `f`, the maximum tolerated Byzantine count for `n = len()`, i.e.
    /// `floor((n - 1) / 3)`.
    pub fn byzantine_tolerance(&self) -> usize {
        self.len().saturating_sub(1) / 3
    }

    pub fn quorum_threshold(&self) -> usize {
        2 * self.byzantine_tolerance() + 1
    }

    /// Removes the member at `effective_day`, if active, producing the set
    /// effective from that day onward (§4.8, §4.10).
    pub fn without(&self, id: &ValidatorId, effective_day: DayNumber) -> Self {
        let members = self
            .members
            .iter()
            .filter(|m| &m.validator_id != id)
            .cloned()
            .collect();
        Self::new(effective_day, members)
    }

    /// Adds a member effective from `effective_day` onward (§4.8).
    pub fn with_joined(&self, member: ValidatorMember, effective_day: DayNumber) -> Self {
        let mut members = self.members.clone();
        members.push(member);
        Self::new(effective_day, members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ids::Hash256;

    fn member(byte: u8, join_epoch: Epoch) -> ValidatorMember {
        ValidatorMember {
            validator_id: ValidatorId(Hash256([byte; 32])),
            join_epoch,
            public_key_bytes: vec![byte],
        }
    }

    #[test]
    fn ordering_is_by_join_epoch_then_id_bytes() {
        let set = ValidatorSet::new(
            0,
            vec![member(9, 2), member(1, 1), member(2, 1)],
        );
        let ids: Vec<u8> = set.members().iter().map(|m| m.validator_id.0 .0[0]).collect();
        assert_eq!(ids, vec![1, 2, 9]);
    }

    #[test]
    fn quorum_threshold_matches_2f_plus_1() {
        let members: Vec<_> = (0..7u8).map(|b| member(b, 0)).collect();
        let set = ValidatorSet::new(0, members);
        assert_eq!(set.byzantine_tolerance(), 2);
        assert_eq!(set.quorum_threshold(), 5);
    }

    #[test]
    fn without_and_with_joined_update_membership() {
        let set = ValidatorSet::new(0, vec![member(1, 0), member(2, 0)]);
        let id_to_remove = set.members()[0].validator_id;
        let shrunk = set.without(&id_to_remove, 5);
        assert_eq!(shrunk.len(), 1);
        assert!(!shrunk.contains(&id_to_remove));

        let grown = shrunk.with_joined(member(3, 5), 7);
        assert_eq!(grown.len(), 2);
        assert_eq!(grown.day, 7);
    }
}
