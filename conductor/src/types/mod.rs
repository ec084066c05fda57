//! Core domain types shared across the consensus core.
//!
//! This module defines strongly-typed identifiers, hashes, and the
//! persisted record shapes described in the data model: [`ValidatorId`],
//! [`Epoch`], [`DayNumber`], [`EventFingerprint`], [`EventBatch`],
//! [`DayProof`]/[`CanonicalDayProof`], [`QuorumCertificate`], [`Block`],
//! and [`BlacklistEntry`]. No type in this module carries a wall-clock
//! timestamp; temporal order is expressed only through [`DayNumber`] and
//! within-day indices.

pub mod batch;
pub mod blacklist;
pub mod block;
pub mod day_proof;
pub mod ids;
pub mod qc;
pub mod validator_set;

pub use batch::EventBatch;
pub use blacklist::{BlacklistEntry, ReasonCode};
pub use block::{Block, BlockHash};
pub use day_proof::{CanonicalDayProof, DayProof};
pub use ids::{DayNumber, Epoch, EventFingerprint, Hash256, ValidatorId, HASH_LEN};
pub use qc::{QuorumCertificate, SignerBitmap};
pub use validator_set::{ValidatorMember, ValidatorSet};
