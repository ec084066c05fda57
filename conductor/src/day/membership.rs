//! Validator-set membership changes (§4.8): join/leave events committed
//! through the normal consensus pipeline, effective at least two days out
//! to allow a key reshare, plus blacklist-driven removal.

use crate::types::{BlacklistEntry, DayNumber, ValidatorId, ValidatorMember, ValidatorSet};

/// Minimum lead time between the day a membership change commits and the
/// day it takes effect, to allow the DKG reshare to complete (§4.8).
pub const MIN_EFFECTIVE_DAY_LEAD: DayNumber = 2;

#[derive(Clone, Debug)]
pub enum MembershipChange {
    Join(ValidatorMember),
    Leave(ValidatorId),
}

#[derive(Debug)]
pub enum MembershipError {
    /// `effective_day` is less than `current_day + MIN_EFFECTIVE_DAY_LEAD`.
    EffectiveDayTooSoon { requested: DayNumber, minimum: DayNumber },
    AlreadyMember(ValidatorId),
    NotAMember(ValidatorId),
}

impl std::fmt::Display for MembershipError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MembershipError::EffectiveDayTooSoon { requested, minimum } => {
                write!(f, "effective day {requested} is before the minimum {minimum}")
            }
            MembershipError::AlreadyMember(id) => write!(f, "{id} is already an active member"),
            MembershipError::NotAMember(id) => write!(f, "{id} is not an active member"),
        }
    }
}

impl std::error::Error for MembershipError {}

/// Validates a proposed membership change against the active set and the
/// day it is committing on, without mutating anything.
pub fn validate_change(
    active: &ValidatorSet,
    change: &MembershipChange,
    effective_day: DayNumber,
    current_day: DayNumber,
) -> Result<(), MembershipError> {
    let minimum = current_day + MIN_EFFECTIVE_DAY_LEAD;
    if effective_day < minimum {
        return Err(MembershipError::EffectiveDayTooSoon {
            requested: effective_day,
            minimum,
        });
    }
    match change {
        MembershipChange::Join(member) if active.contains(&member.validator_id) => {
            Err(MembershipError::AlreadyMember(member.validator_id))
        }
        MembershipChange::Leave(id) if !active.contains(id) => Err(MembershipError::NotAMember(*id)),
        _ => Ok(()),
    }
}

/// Applies an already-validated change, producing the set effective from
/// `effective_day` onward.
pub fn apply_change(active: &ValidatorSet, change: &MembershipChange, effective_day: DayNumber) -> ValidatorSet {
    match change {
        MembershipChange::Join(member) => active.with_joined(member.clone(), effective_day),
        MembershipChange::Leave(id) => active.without(id, effective_day),
    }
}

/// Removes a validator whose blacklist entry has become canonical, at its
/// `effective_day` (§4.8, §4.10). A no-op if the validator is already
/// absent from `active`.
pub fn apply_blacklist_removal(active: &ValidatorSet, entry: &BlacklistEntry) -> ValidatorSet {
    active.without(&entry.validator_id, entry.effective_day)
}

/// `true` if `before` and `after` differ in membership, meaning the group
/// threshold key must be reshared before `after` takes effect.
pub fn reshare_required(before: &ValidatorSet, after: &ValidatorSet) -> bool {
    before.members() != after.members()
}

/// Hook invoked once a membership change commits: logs that a reshare is
/// owed. The actual DKG protocol is out of scope (§D.2 freezes the
/// trusted-dealer `ThresholdContext::deal` for this lineage); until a
/// reshare mechanism exists, consensus keeps running on the existing
/// shares, exactly as §4.8 allows.
pub fn trigger_reshare(before: &ValidatorSet, after: &ValidatorSet) {
    if reshare_required(before, after) {
        tracing::info!(
            from_day = before.day,
            to_day = after.day,
            member_count = after.len(),
            "membership change committed, DKG reshare owed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Hash256;

    fn member(byte: u8) -> ValidatorMember {
        ValidatorMember {
            validator_id: ValidatorId(Hash256([byte; 32])),
            join_epoch: 0,
            public_key_bytes: vec![byte],
        }
    }

    #[test]
    fn join_requires_minimum_lead_time() {
        let set = ValidatorSet::new(0, vec![member(1)]);
        let change = MembershipChange::Join(member(2));
        let result = validate_change(&set, &change, 1, 0);
        assert!(matches!(result, Err(MembershipError::EffectiveDayTooSoon { .. })));
        assert!(validate_change(&set, &change, 2, 0).is_ok());
    }

    #[test]
    fn cannot_join_an_existing_member() {
        let set = ValidatorSet::new(0, vec![member(1)]);
        let change = MembershipChange::Join(member(1));
        let result = validate_change(&set, &change, 5, 0);
        assert!(matches!(result, Err(MembershipError::AlreadyMember(_))));
    }

    #[test]
    fn cannot_leave_a_non_member() {
        let set = ValidatorSet::new(0, vec![member(1)]);
        let change = MembershipChange::Leave(ValidatorId(Hash256([9u8; 32])));
        let result = validate_change(&set, &change, 5, 0);
        assert!(matches!(result, Err(MembershipError::NotAMember(_))));
    }

    #[test]
    fn apply_join_then_leave_round_trips_membership() {
        let set = ValidatorSet::new(0, vec![member(1)]);
        let joined = apply_change(&set, &MembershipChange::Join(member(2)), 2);
        assert_eq!(joined.len(), 2);
        assert!(reshare_required(&set, &joined));

        let left = apply_change(&joined, &MembershipChange::Leave(member(1).validator_id), 4);
        assert_eq!(left.len(), 1);
        assert!(!left.contains(&member(1).validator_id));
    }

    #[test]
    fn blacklist_removal_excludes_member_from_effective_day() {
        use crate::types::{QuorumCertificate, ReasonCode, SignerBitmap};
        let set = ValidatorSet::new(0, vec![member(1), member(2)]);
        let entry = BlacklistEntry {
            validator_id: member(1).validator_id,
            reason_code: ReasonCode::Equivocation,
            evidence_digest: Hash256::zero(),
            effective_day: 6,
            quorum_certificate: QuorumCertificate {
                message_digest: Hash256::zero(),
                aggregate_signature: vec![],
                signer_set: SignerBitmap::new(2),
            },
        };
        let after = apply_blacklist_removal(&set, &entry);
        assert!(!after.contains(&member(1).validator_id));
        assert_eq!(after.day, 6);
    }
}
