//! Evidence records for Byzantine behavior (§4.10). Each record is
//! cryptographically self-contained: it carries the offending signed
//! message(s) so any third party can verify the claim without trusting the
//! reporter.

use serde::{Deserialize, Serialize};

use crate::peer::PeerEnvelope;
use crate::types::{BlacklistEntry, DayProof, Epoch, Hash256, ReasonCode, ValidatorId};

/// The RBC phase in which two conflicting digests were observed for the
/// same `(epoch, proposer)`, naming the specific equivocation in §4.10.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum EquivocationPhase {
    Propose,
    Ready,
}

/// A self-contained record of Byzantine behavior, carrying whatever signed
/// material proves the claim.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum EvidenceRecord {
    VdfTooFast {
        peer: ValidatorId,
        measured_delta_micros: u64,
    },
    VdfInvalid {
        peer: ValidatorId,
        day_proof: DayProof,
    },
    SignatureInvalid {
        peer: ValidatorId,
        envelope: PeerEnvelope,
    },
    Equivocation {
        proposer: ValidatorId,
        epoch: Epoch,
        phase: EquivocationPhase,
        envelope_a: PeerEnvelope,
        envelope_b: PeerEnvelope,
    },
    Replay {
        peer: ValidatorId,
        envelope: PeerEnvelope,
    },
}

impl EvidenceRecord {
    pub fn subject(&self) -> ValidatorId {
        match self {
            EvidenceRecord::VdfTooFast { peer, .. } => *peer,
            EvidenceRecord::VdfInvalid { peer, .. } => *peer,
            EvidenceRecord::SignatureInvalid { peer, .. } => *peer,
            EvidenceRecord::Equivocation { proposer, .. } => *proposer,
            EvidenceRecord::Replay { peer, .. } => *peer,
        }
    }

    pub fn reason_code(&self) -> ReasonCode {
        match self {
            EvidenceRecord::VdfTooFast { .. } => ReasonCode::VdfTooFast,
            EvidenceRecord::VdfInvalid { .. } => ReasonCode::VdfInvalid,
            EvidenceRecord::SignatureInvalid { .. } => ReasonCode::SignatureInvalid,
            EvidenceRecord::Equivocation { .. } => ReasonCode::Equivocation,
            EvidenceRecord::Replay { .. } => ReasonCode::Replay,
        }
    }

    /// Canonical digest of this record; becomes `BlacklistEntry::evidence_digest`
    /// once a ballot referencing it commits.
    pub fn digest(&self) -> Hash256 {
        let cfg = bincode::config::standard();
        let bytes = bincode::serde::encode_to_vec(self, cfg).expect("evidence must serialize");
        Hash256::compute(&bytes)
    }
}

/// `true` if `entry` is the canonical consequence of `evidence`: same
/// subject, same reason code, and same evidence digest.
pub fn entry_matches_evidence(entry: &BlacklistEntry, evidence: &EvidenceRecord) -> bool {
    entry.validator_id == evidence.subject()
        && entry.reason_code == evidence.reason_code()
        && entry.evidence_digest == evidence.digest()
}
