//! RocksDB-backed store.
//!
//! Persists the canonical namespaces in dedicated column families:
//!
//! - `"block"`:          `epoch` (big-endian u64) -> canonical block bytes
//! - `"day_proof"`:      `day` (big-endian u64) -> canonical day-proof bytes
//! - `"blacklist"`:      `validator_id` (32 bytes) -> canonical entry bytes
//! - `"validator_set"`:  `day` (big-endian u64) -> canonical set bytes
//! - `"meta"`:           arbitrary key -> arbitrary value

use std::path::Path;
use std::sync::Arc;

use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, Options, DB};

use crate::types::{
    BlacklistEntry, Block, CanonicalDayProof, DayNumber, Epoch, ValidatorId, ValidatorSet,
};

use super::traits::{ConductorStore, StorageError};

const CF_BLOCK: &str = "block";
const CF_DAY_PROOF: &str = "day_proof";
const CF_BLACKLIST: &str = "blacklist";
const CF_VALIDATOR_SET: &str = "validator_set";
const CF_META: &str = "meta";

/// Configuration for [`RocksDbStore`].
#[derive(Clone, Debug)]
pub struct RocksDbConfig {
    pub path: String,
    pub create_if_missing: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "data/conductor-db".to_string(),
            create_if_missing: true,
        }
    }
}

impl From<rocksdb::Error> for StorageError {
    fn from(e: rocksdb::Error) -> Self {
        StorageError::Backend(e.to_string())
    }
}

/// RocksDB-backed implementation of [`ConductorStore`].
pub struct RocksDbStore {
    db: DB,
}

impl RocksDbStore {
    pub fn open(cfg: &RocksDbConfig) -> Result<Self, StorageError> {
        let path = Path::new(&cfg.path);

        let mut opts = Options::default();
        opts.create_if_missing(cfg.create_if_missing);
        opts.create_missing_column_families(cfg.create_if_missing);

        let cfs = vec![
            ColumnFamilyDescriptor::new("default", Options::default()),
            ColumnFamilyDescriptor::new(CF_BLOCK, Options::default()),
            ColumnFamilyDescriptor::new(CF_DAY_PROOF, Options::default()),
            ColumnFamilyDescriptor::new(CF_BLACKLIST, Options::default()),
            ColumnFamilyDescriptor::new(CF_VALIDATOR_SET, Options::default()),
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;
        Ok(Self { db })
    }

    fn cf(&self, name: &'static str) -> Result<Arc<BoundColumnFamily<'_>>, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or(StorageError::Backend(format!("missing column family {name}")))
    }

    /// Write-if-absent with equality fallback: an identical rewrite of an
    /// occupied key is a no-op, a distinct value is a conflict.
    fn write_once(&self, cf_name: &'static str, key: &[u8], bytes: &[u8]) -> Result<(), StorageError> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(&cf, key)? {
            None => {
                self.db.put_cf(&cf, key, bytes)?;
                Ok(())
            }
            Some(existing) if existing == bytes => Ok(()),
            Some(_) => Err(StorageError::Conflict(cf_name)),
        }
    }

    fn get_bytes(&self, cf_name: &'static str, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        let cf = self.cf(cf_name)?;
        Ok(self.db.get_cf(&cf, key)?)
    }
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8], ns: &'static str) -> Result<T, StorageError> {
    let cfg = bincode::config::standard();
    bincode::serde::decode_from_slice(bytes, cfg)
        .map(|(value, _)| value)
        .map_err(|_| StorageError::Corrupted(ns))
}

fn encode<T: serde::Serialize>(value: &T) -> Vec<u8> {
    let cfg = bincode::config::standard();
    bincode::serde::encode_to_vec(value, cfg).expect("record must be serializable")
}

impl ConductorStore for RocksDbStore {
    fn get_block(&self, epoch: Epoch) -> Result<Option<Block>, StorageError> {
        match self.get_bytes(CF_BLOCK, &epoch.to_be_bytes())? {
            None => Ok(None),
            Some(bytes) => Ok(Some(decode(&bytes, CF_BLOCK)?)),
        }
    }

    fn put_block(&self, block: Block) -> Result<(), StorageError> {
        let key = block.epoch.to_be_bytes();
        self.write_once(CF_BLOCK, &key, &encode(&block))
    }

    fn get_day_proof(&self, day: DayNumber) -> Result<Option<CanonicalDayProof>, StorageError> {
        match self.get_bytes(CF_DAY_PROOF, &day.to_be_bytes())? {
            None => Ok(None),
            Some(bytes) => Ok(Some(decode(&bytes, CF_DAY_PROOF)?)),
        }
    }

    fn put_day_proof(&self, proof: CanonicalDayProof) -> Result<(), StorageError> {
        let key = proof.day_number().to_be_bytes();
        self.write_once(CF_DAY_PROOF, &key, &encode(&proof))
    }

    fn get_blacklist_entry(
        &self,
        validator_id: &ValidatorId,
    ) -> Result<Option<BlacklistEntry>, StorageError> {
        match self.get_bytes(CF_BLACKLIST, validator_id.0.as_bytes())? {
            None => Ok(None),
            Some(bytes) => Ok(Some(decode(&bytes, CF_BLACKLIST)?)),
        }
    }

    fn put_blacklist_entry(&self, entry: BlacklistEntry) -> Result<(), StorageError> {
        let key = *entry.validator_id.0.as_bytes();
        self.write_once(CF_BLACKLIST, &key, &encode(&entry))
    }

    fn supersede_blacklist_entry(&self, entry: BlacklistEntry) -> Result<(), StorageError> {
        let key = *entry.validator_id.0.as_bytes();
        let cf = self.cf(CF_BLACKLIST)?;
        self.db.put_cf(&cf, key, &encode(&entry))?;
        Ok(())
    }

    fn list_blacklist_entries(&self) -> Result<Vec<BlacklistEntry>, StorageError> {
        let cf = self.cf(CF_BLACKLIST)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(&cf, rocksdb::IteratorMode::Start) {
            let (_, value) = item?;
            out.push(decode(&value, CF_BLACKLIST)?);
        }
        Ok(out)
    }

    fn get_validator_set(&self, day: DayNumber) -> Result<Option<ValidatorSet>, StorageError> {
        match self.get_bytes(CF_VALIDATOR_SET, &day.to_be_bytes())? {
            None => Ok(None),
            Some(bytes) => Ok(Some(decode(&bytes, CF_VALIDATOR_SET)?)),
        }
    }

    fn put_validator_set(&self, set: ValidatorSet) -> Result<(), StorageError> {
        let key = set.day.to_be_bytes();
        self.write_once(CF_VALIDATOR_SET, &key, &encode(&set))
    }

    fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.get_bytes(CF_META, key.as_bytes())
    }

    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let cf = self.cf(CF_META)?;
        self.db.put_cf(&cf, key.as_bytes(), value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventFingerprint, Hash256, QuorumCertificate, SignerBitmap};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn dummy_block(epoch: Epoch) -> Block {
        Block {
            epoch,
            events: vec![EventFingerprint(Hash256([epoch as u8; 32]))],
            merkle_root: Hash256::zero(),
            proposer_set: BTreeSet::new(),
            quorum_certificate: QuorumCertificate {
                message_digest: Hash256::zero(),
                aggregate_signature: vec![],
                signer_set: SignerBitmap::new(1),
            },
        }
    }

    #[test]
    fn rocksdb_store_roundtrips_block_and_meta() {
        let tmp = TempDir::new().expect("temp dir");
        let cfg = RocksDbConfig {
            path: tmp.path().to_string_lossy().to_string(),
            create_if_missing: true,
        };
        let store = RocksDbStore::open(&cfg).expect("open rocksdb");

        let block = dummy_block(7);
        store.put_block(block.clone()).expect("put block");
        let fetched = store.get_block(7).expect("get").expect("present");
        assert_eq!(fetched.epoch, 7);

        store.put_meta("genesis_seed", b"abc").expect("put meta");
        assert_eq!(store.get_meta("genesis_seed").unwrap().unwrap(), b"abc");
    }

    #[test]
    fn conflicting_block_rewrite_is_rejected() {
        let tmp = TempDir::new().expect("temp dir");
        let cfg = RocksDbConfig {
            path: tmp.path().to_string_lossy().to_string(),
            create_if_missing: true,
        };
        let store = RocksDbStore::open(&cfg).expect("open rocksdb");

        store.put_block(dummy_block(1)).expect("first write");
        let mut conflicting = dummy_block(1);
        conflicting.merkle_root = Hash256([0xFFu8; 32]);
        let err = store.put_block(conflicting).unwrap_err();
        assert!(matches!(err, StorageError::Conflict(CF_BLOCK)));
    }
}
