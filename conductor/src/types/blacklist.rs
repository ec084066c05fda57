//! Blacklist entries: committed ballots excluding a validator from the
//! active set starting at a future day.

use serde::{Deserialize, Serialize};

use super::ids::{DayNumber, Hash256, ValidatorId};
use super::qc::QuorumCertificate;

/// Reason a validator was blacklisted; mirrors the evidence kinds produced
/// by [`crate::detection::evidence::EvidenceRecord`] plus a reciprocal
/// `Unblacklist` marker so ballots and their reversals share one type.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ReasonCode {
    VdfTooFast,
    VdfInvalid,
    SignatureInvalid,
    Equivocation,
    Replay,
    Unblacklist,
}

/// A committed blacklist (or unblacklist) ballot. A validator identifier
/// appears in at most one *active* entry at a time (invariant enforced by
/// [`crate::detection::blacklist`]).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub validator_id: ValidatorId,
    pub reason_code: ReasonCode,
    pub evidence_digest: Hash256,
    pub effective_day: DayNumber,
    pub quorum_certificate: QuorumCertificate,
}

impl BlacklistEntry {
    pub fn is_active_at(&self, day: DayNumber) -> bool {
        day >= self.effective_day
    }
}
