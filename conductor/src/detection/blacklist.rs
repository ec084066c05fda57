//! Blacklist ballot construction and commit (§4.10).
//!
//! A ballot is an ordinary event carried through the normal consensus
//! pipeline: it is proposed, signed share by share, aggregated into a QC
//! exactly like a [`crate::types::DayProof`], and only becomes a canonical
//! [`BlacklistEntry`] once `2f+1` active validators have endorsed it.

use serde::Serialize;

use crate::crypto::threshold::{SignatureShareBytes, ThresholdContext};
use crate::storage::{ConductorStore, StorageError};
use crate::types::{BlacklistEntry, DayNumber, Hash256, QuorumCertificate, ReasonCode, SignerBitmap, ValidatorId};

#[derive(Debug)]
pub enum BlacklistError {
    /// `validator_id` already has an active entry and `reason_code` is not
    /// `Unblacklist`; at most one active entry per validator is allowed.
    AlreadyActive(ValidatorId),
    /// An unblacklist ballot was proposed for a validator with no active
    /// entry to reverse.
    NoActiveEntry(ValidatorId),
    InsufficientQuorum { required: usize, provided: usize },
    Storage(StorageError),
}

impl std::fmt::Display for BlacklistError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlacklistError::AlreadyActive(id) => write!(f, "{id} already has an active blacklist entry"),
            BlacklistError::NoActiveEntry(id) => write!(f, "{id} has no active blacklist entry to reverse"),
            BlacklistError::InsufficientQuorum { required, provided } => {
                write!(f, "insufficient quorum: need {required}, got {provided}")
            }
            BlacklistError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for BlacklistError {}

impl From<StorageError> for BlacklistError {
    fn from(e: StorageError) -> Self {
        BlacklistError::Storage(e)
    }
}

/// An unsigned blacklist (or unblacklist) proposal, the event a validator
/// signs its share over before submission through the consensus pipeline.
#[derive(Clone, Debug)]
pub struct BlacklistBallot {
    pub validator_id: ValidatorId,
    pub reason_code: ReasonCode,
    pub evidence_digest: Hash256,
    pub effective_day: DayNumber,
}

impl BlacklistBallot {
    fn signing_bytes(&self) -> Vec<u8> {
        let cfg = bincode::config::standard();
        #[derive(Serialize)]
        struct Unsigned<'a> {
            validator_id: &'a ValidatorId,
            reason_code: ReasonCode,
            evidence_digest: &'a Hash256,
            effective_day: DayNumber,
        }
        let unsigned = Unsigned {
            validator_id: &self.validator_id,
            reason_code: self.reason_code,
            evidence_digest: &self.evidence_digest,
            effective_day: self.effective_day,
        };
        bincode::serde::encode_to_vec(&unsigned, cfg).expect("ballot must be serializable")
    }

    pub fn digest(&self) -> Hash256 {
        Hash256::compute(&self.signing_bytes())
    }
}

/// Checks §4.10's single-active-entry invariant before a ballot is
/// proposed: a plain blacklist ballot requires no existing active entry; an
/// unblacklist ballot requires one.
pub fn check_proposal_allowed(
    existing: Option<&BlacklistEntry>,
    ballot: &BlacklistBallot,
    day: DayNumber,
) -> Result<(), BlacklistError> {
    let currently_active = existing.map(|e| e.is_active_at(day)).unwrap_or(false);
    match (ballot.reason_code, currently_active) {
        (ReasonCode::Unblacklist, false) => Err(BlacklistError::NoActiveEntry(ballot.validator_id)),
        (code, true) if code != ReasonCode::Unblacklist => Err(BlacklistError::AlreadyActive(ballot.validator_id)),
        _ => Ok(()),
    }
}

/// Aggregates `shares` over `ballot`'s digest into a [`BlacklistEntry`],
/// requiring `2f+1` signers out of `n` active validators.
pub fn commit_ballot(
    ctx: &ThresholdContext,
    ballot: &BlacklistBallot,
    shares: &[SignatureShareBytes],
    n: usize,
    f: usize,
) -> Result<BlacklistEntry, BlacklistError> {
    let digest = ballot.digest();
    let aggregate_signature = ctx
        .aggregate(shares)
        .map_err(|_| BlacklistError::InsufficientQuorum {
            required: 2 * f + 1,
            provided: shares.len(),
        })?;

    let mut signer_set = SignerBitmap::new(n);
    for share in shares {
        signer_set.set(share.index);
    }

    let qc = QuorumCertificate {
        message_digest: digest,
        aggregate_signature,
        signer_set,
    };
    if !qc.has_quorum(f) {
        return Err(BlacklistError::InsufficientQuorum {
            required: 2 * f + 1,
            provided: qc.signer_set.popcount(),
        });
    }

    Ok(BlacklistEntry {
        validator_id: ballot.validator_id,
        reason_code: ballot.reason_code,
        evidence_digest: ballot.evidence_digest,
        effective_day: ballot.effective_day,
        quorum_certificate: qc,
    })
}

/// Persists a committed entry, enforcing the single-active-entry invariant
/// against whatever is already in `store` and routing to the write-once or
/// superseding storage path as appropriate.
pub fn persist_entry(
    store: &dyn ConductorStore,
    entry: BlacklistEntry,
    day: DayNumber,
) -> Result<(), BlacklistError> {
    let existing = store.get_blacklist_entry(&entry.validator_id)?;
    let ballot_view = BlacklistBallot {
        validator_id: entry.validator_id,
        reason_code: entry.reason_code,
        evidence_digest: entry.evidence_digest,
        effective_day: entry.effective_day,
    };
    check_proposal_allowed(existing.as_ref(), &ballot_view, day)?;
    match existing {
        Some(_) => Ok(store.supersede_blacklist_entry(entry)?),
        None => Ok(store.put_blacklist_entry(entry)?),
    }
}

/// Whether `validator_id` is excluded from the active set as of `day`: it
/// has an entry, that entry is active at `day`, and it is not an
/// unblacklist reversal.
pub fn is_excluded(entry: &BlacklistEntry, day: DayNumber) -> bool {
    entry.is_active_at(day) && entry.reason_code != ReasonCode::Unblacklist
}
