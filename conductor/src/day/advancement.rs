//! Day-advancement protocol (§4.7): collect verified `DayProof`s for `d+1`
//! from the active set, assemble a QC once `2f+1` validators agree on the
//! same `output`, and detect the conflict case where divergent outputs
//! prevent any group from reaching quorum.

use std::collections::HashMap;

use crate::crypto::identity::verify_signature;
use crate::crypto::threshold::{SignatureShareBytes, ThresholdContext};
use crate::detection::evidence::EvidenceRecord;
use crate::types::{CanonicalDayProof, DayNumber, DayProof, QuorumCertificate, SignerBitmap, ValidatorId};
use crate::vdf::VdfEngine;

#[derive(Debug)]
pub enum DayAdvancementError {
    /// The proposer's own signature over the proof does not verify.
    InvalidSignature(ValidatorId),
    /// Re-running the VDF locally does not reproduce the claimed output.
    InvalidVdfOutput(ValidatorId),
    /// This proposer already submitted a proof for this day.
    DuplicateProposer(ValidatorId),
    InsufficientQuorum { required: usize, provided: usize },
    /// Every active validator reported and no output reached quorum: the
    /// day's VDF output has genuinely diverged and must be retried.
    Unrecoverable { day: DayNumber },
}

impl std::fmt::Display for DayAdvancementError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DayAdvancementError::InvalidSignature(id) => write!(f, "invalid day-proof signature from {id}"),
            DayAdvancementError::InvalidVdfOutput(id) => write!(f, "invalid VDF output claimed by {id}"),
            DayAdvancementError::DuplicateProposer(id) => write!(f, "duplicate day-proof submission from {id}"),
            DayAdvancementError::InsufficientQuorum { required, provided } => {
                write!(f, "insufficient quorum: need {required}, got {provided}")
            }
            DayAdvancementError::Unrecoverable { day } => {
                write!(f, "day {day} has divergent VDF outputs with no majority")
            }
        }
    }
}

impl std::error::Error for DayAdvancementError {}

/// Accumulates `DayProof`s submitted by the active set for a single target
/// day, grouped by claimed `output` so a quorum (or an unrecoverable
/// conflict) can be detected.
pub struct DayAdvancementTracker {
    groups: HashMap<[u8; 32], Vec<DayProof>>,
    seen_proposers: HashMap<ValidatorId, [u8; 32]>,
}

impl DayAdvancementTracker {
    pub fn new() -> Self {
        Self {
            groups: HashMap::new(),
            seen_proposers: HashMap::new(),
        }
    }

    /// Verifies `proof`'s signature and VDF output, then folds it into the
    /// per-output group. Rejects a second submission from the same
    /// proposer without recording it (the first stands).
    pub fn record(
        &mut self,
        proof: DayProof,
        proposer_public_key: &[u8],
        engine: &VdfEngine,
    ) -> Result<(), DayAdvancementError> {
        if self.seen_proposers.contains_key(&proof.proposer) {
            return Err(DayAdvancementError::DuplicateProposer(proof.proposer));
        }
        let bytes = proof.signing_bytes();
        if verify_signature(proposer_public_key, &bytes, &proof.proposer_signature).is_err() {
            return Err(DayAdvancementError::InvalidSignature(proof.proposer));
        }
        if !engine.verify(&proof.seed, proof.difficulty, &proof.output) {
            return Err(DayAdvancementError::InvalidVdfOutput(proof.proposer));
        }
        self.seen_proposers.insert(proof.proposer, proof.output);
        self.groups.entry(proof.output).or_default().push(proof);
        Ok(())
    }

    /// The output with at least `threshold` distinct proposers, if any.
    pub fn quorum_output(&self, threshold: usize) -> Option<[u8; 32]> {
        self.groups
            .iter()
            .find(|(_, proofs)| proofs.len() >= threshold)
            .map(|(output, _)| *output)
    }

    /// `true` once every active validator has reported and no output
    /// reached `threshold` — the conflict case in §4.7: the day must be
    /// retried and evidence emitted against the divergent minority.
    pub fn is_unrecoverable(&self, active_validator_count: usize, threshold: usize) -> bool {
        let total: usize = self.groups.values().map(Vec::len).sum();
        total >= active_validator_count && self.quorum_output(threshold).is_none()
    }

    /// `Err(DayAdvancementError::Unrecoverable)` once [`Self::is_unrecoverable`]
    /// holds, naming the day every recorded proof claims.
    pub fn check_unrecoverable(
        &self,
        active_validator_count: usize,
        threshold: usize,
    ) -> Result<(), DayAdvancementError> {
        if self.is_unrecoverable(active_validator_count, threshold) {
            let day = self
                .groups
                .values()
                .flatten()
                .next()
                .map(|p| p.day_number)
                .unwrap_or_default();
            return Err(DayAdvancementError::Unrecoverable { day });
        }
        Ok(())
    }

    /// Builds `VDF_INVALID` evidence against every proposer outside the
    /// largest observed group, once [`Self::is_unrecoverable`] holds. The
    /// largest group is treated as the presumptively honest majority since
    /// the VDF is deterministic: at most one output can be correct.
    pub fn divergence_evidence(&self) -> Vec<EvidenceRecord> {
        let Some(majority_output) = self.groups.iter().max_by_key(|(_, proofs)| proofs.len()).map(|(o, _)| *o)
        else {
            return Vec::new();
        };
        self.groups
            .iter()
            .filter(|(output, _)| **output != majority_output)
            .flat_map(|(_, proofs)| {
                proofs.iter().map(|p| EvidenceRecord::VdfInvalid {
                    peer: p.proposer,
                    day_proof: p.clone(),
                })
            })
            .collect()
    }

    /// Aggregates `shares` (each validator's threshold signature over the
    /// quorum output's digest) into a [`CanonicalDayProof`] once `2f+1` is
    /// reached, picking an arbitrary representative proof from the
    /// quorum-reaching group to carry as `day_proof`.
    pub fn commit(
        &self,
        ctx: &ThresholdContext,
        output: [u8; 32],
        shares: &[SignatureShareBytes],
        n: usize,
        f: usize,
    ) -> Result<CanonicalDayProof, DayAdvancementError> {
        let group = self.groups.get(&output).ok_or(DayAdvancementError::InsufficientQuorum {
            required: 2 * f + 1,
            provided: 0,
        })?;
        let representative = group.first().expect("non-empty group").clone();
        let digest = representative.digest();

        let aggregate_signature =
            ctx.aggregate(shares)
                .map_err(|_| DayAdvancementError::InsufficientQuorum {
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
            return Err(DayAdvancementError::InsufficientQuorum {
                required: 2 * f + 1,
                provided: qc.signer_set.popcount(),
            });
        }
        Ok(CanonicalDayProof {
            day_proof: representative,
            quorum_certificate: qc,
        })
    }
}

impl Default for DayAdvancementTracker {
    fn default() -> Self {
        Self::new()
    }
}
