//! Storage abstraction used by the orchestrator, day-advancement, and
//! detection modules.
//!
//! The canonical namespaces from §4.9 — `block/{epoch}`, `day_proof/{day}`,
//! `blacklist/{validator_id}`, `validator_set/{day}`, `meta/` — are
//! linearizable and idempotent keyed by their primary key: writing the
//! same record twice is a no-op, writing a different record under an
//! already-occupied key is rejected as [`StorageError::Conflict`].

use crate::types::{
    BlacklistEntry, Block, CanonicalDayProof, DayNumber, Epoch, ValidatorId, ValidatorSet,
};

/// Storage-level error type.
#[derive(Debug)]
pub enum StorageError {
    /// A write targeted an occupied primary key with a different value.
    Conflict(&'static str),
    /// Underlying backend error (RocksDB, I/O, ...).
    Backend(String),
    /// Stored bytes failed to decode into the expected record type.
    Corrupted(&'static str),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Conflict(ns) => write!(f, "conflicting write to {ns}"),
            StorageError::Backend(msg) => write!(f, "storage backend error: {msg}"),
            StorageError::Corrupted(ns) => write!(f, "corrupted record in {ns}"),
        }
    }
}

impl std::error::Error for StorageError {}

/// Abstract storage interface for the canonical namespaces. Implementations
/// can be backed by in-memory maps (tests, devnets) or RocksDB (persistent
/// validator nodes).
pub trait ConductorStore: Send + Sync {
    fn get_block(&self, epoch: Epoch) -> Result<Option<Block>, StorageError>;
    /// Write-once: inserting an identical block at an occupied key is a
    /// no-op; inserting a different one is a [`StorageError::Conflict`].
    fn put_block(&self, block: Block) -> Result<(), StorageError>;

    fn get_day_proof(&self, day: DayNumber) -> Result<Option<CanonicalDayProof>, StorageError>;
    fn put_day_proof(&self, proof: CanonicalDayProof) -> Result<(), StorageError>;

    fn get_blacklist_entry(
        &self,
        validator_id: &ValidatorId,
    ) -> Result<Option<BlacklistEntry>, StorageError>;
    fn put_blacklist_entry(&self, entry: BlacklistEntry) -> Result<(), StorageError>;
    /// Overwrites whatever entry is currently stored for
    /// `entry.validator_id`, unlike [`Self::put_blacklist_entry`]'s
    /// write-once discipline. The only legitimate caller is an unblacklist
    /// (or a fresh re-blacklist) ballot committing over a prior entry for
    /// the same validator.
    fn supersede_blacklist_entry(&self, entry: BlacklistEntry) -> Result<(), StorageError>;
    fn list_blacklist_entries(&self) -> Result<Vec<BlacklistEntry>, StorageError>;

    fn get_validator_set(&self, day: DayNumber) -> Result<Option<ValidatorSet>, StorageError>;
    fn put_validator_set(&self, set: ValidatorSet) -> Result<(), StorageError>;

    /// Arbitrary metadata (genesis seed, active-set snapshot pointer,
    /// orchestrator recovery state). Unlike the other namespaces this one
    /// is a plain overwrite, not write-once — it exists for small values
    /// whose latest version is always the truth.
    fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;
}
