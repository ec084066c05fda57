//! Byzantine detection and blacklist voting (§4.10).

pub mod blacklist;
pub mod evidence;

pub use blacklist::{BlacklistBallot, BlacklistError, check_proposal_allowed, commit_ballot, is_excluded, persist_entry};
pub use evidence::{entry_matches_evidence, EquivocationPhase, EvidenceRecord};
