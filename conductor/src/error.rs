//! Crate-level error kinds (§7): every module error funnels into one of
//! these for logging, metrics, and the retry/timeout policy that drives
//! [`crate::retry`].

use crate::acs::AcsError;
use crate::boundary::BoundaryError;
use crate::day::{DayAdvancementError, MembershipError};
use crate::detection::BlacklistError;
use crate::orchestrator::{EpochError, OrderingError};
use crate::storage::StorageError;

/// Unified error surface for the consensus core.
///
/// Each module keeps its own narrow error enum (`RbcError`, `BbaError`,
/// `EpochError`, ...); this is the kind every one of them is classified
/// into once it crosses a boundary that needs to decide "retry, log, or
/// give up" (§7).
#[derive(Debug)]
pub enum ConductorError {
    /// Malformed input, invalid signature, unknown validator, invalid
    /// Merkle proof. Rejected at the adapter boundary; never retried.
    Validation(String),
    /// Caller not known to the trust anchor.
    Authentication,
    /// Caller known but not permitted for this call.
    Authorization,
    /// An epoch did not finalize within its timeout budget. Retried with
    /// backoff; upward pollers see `PENDING` until the budget is
    /// exhausted.
    ConsensusTimeout { epoch: u64 },
    /// Fewer than `2f+1` honest participants were reachable.
    InsufficientQuorum { required: usize, provided: usize },
    /// Divergent VDF outputs reported for the same day.
    ConflictingDayProof { day: u64 },
    /// A second commit was attempted for a primary key already written.
    /// Recovered by reading the existing record.
    StorageConflict,
    /// Unrecoverable storage corruption or a failed invariant check. The
    /// process should exit; this is not retried.
    Fatal(String),
}

impl std::fmt::Display for ConductorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConductorError::Validation(msg) => write!(f, "validation error: {msg}"),
            ConductorError::Authentication => write!(f, "caller is not authenticated"),
            ConductorError::Authorization => write!(f, "caller is not authorized"),
            ConductorError::ConsensusTimeout { epoch } => write!(f, "epoch {epoch} did not finalize in time"),
            ConductorError::InsufficientQuorum { required, provided } => {
                write!(f, "insufficient quorum: need {required}, have {provided}")
            }
            ConductorError::ConflictingDayProof { day } => write!(f, "divergent VDF outputs reported for day {day}"),
            ConductorError::StorageConflict => write!(f, "a conflicting record already exists"),
            ConductorError::Fatal(msg) => write!(f, "fatal error: {msg}"),
        }
    }
}

impl std::error::Error for ConductorError {}

impl From<StorageError> for ConductorError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Conflict(_) => ConductorError::StorageConflict,
            other => ConductorError::Fatal(other.to_string()),
        }
    }
}

impl From<BoundaryError> for ConductorError {
    fn from(e: BoundaryError) -> Self {
        match e {
            BoundaryError::Unauthenticated => ConductorError::Authentication,
            BoundaryError::PermissionDenied => ConductorError::Authorization,
            BoundaryError::Storage(storage_err) => storage_err.into(),
            BoundaryError::TooManyEvents { .. } | BoundaryError::TooLarge { .. } => {
                ConductorError::Validation(e.to_string())
            }
        }
    }
}

impl From<AcsError> for ConductorError {
    fn from(e: AcsError) -> Self {
        ConductorError::Validation(e.to_string())
    }
}

impl From<EpochError> for ConductorError {
    fn from(e: EpochError) -> Self {
        match e {
            EpochError::AlreadyCommitted(_) => ConductorError::StorageConflict,
            EpochError::OutOfOrder { epoch, .. } => ConductorError::ConsensusTimeout { epoch },
            EpochError::InsufficientQuorum { required, provided } => {
                ConductorError::InsufficientQuorum { required, provided }
            }
            EpochError::Storage(storage_err) => storage_err.into(),
            other => ConductorError::Validation(other.to_string()),
        }
    }
}

impl From<OrderingError> for ConductorError {
    fn from(e: OrderingError) -> Self {
        ConductorError::Validation(e.to_string())
    }
}

impl From<DayAdvancementError> for ConductorError {
    fn from(e: DayAdvancementError) -> Self {
        match e {
            DayAdvancementError::InsufficientQuorum { required, provided } => {
                ConductorError::InsufficientQuorum { required, provided }
            }
            DayAdvancementError::Unrecoverable { day } => ConductorError::ConflictingDayProof { day },
            other => ConductorError::Validation(other.to_string()),
        }
    }
}

impl From<MembershipError> for ConductorError {
    fn from(e: MembershipError) -> Self {
        ConductorError::Validation(e.to_string())
    }
}

impl From<BlacklistError> for ConductorError {
    fn from(e: BlacklistError) -> Self {
        match e {
            BlacklistError::InsufficientQuorum { required, provided } => {
                ConductorError::InsufficientQuorum { required, provided }
            }
            BlacklistError::Storage(storage_err) => storage_err.into(),
            other => ConductorError::Validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_conflict_maps_to_storage_conflict_kind() {
        let err: ConductorError = StorageError::Conflict("block").into();
        assert!(matches!(err, ConductorError::StorageConflict));
    }

    #[test]
    fn boundary_unauthenticated_maps_to_authentication_kind() {
        let err: ConductorError = BoundaryError::Unauthenticated.into();
        assert!(matches!(err, ConductorError::Authentication));
    }

    #[test]
    fn day_advancement_unrecoverable_maps_to_conflicting_day_proof_kind() {
        let err: ConductorError = DayAdvancementError::Unrecoverable { day: 7 }.into();
        assert!(matches!(err, ConductorError::ConflictingDayProof { day: 7 }));
    }
}
