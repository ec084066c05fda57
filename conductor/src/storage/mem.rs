//! In-memory store. Useful for unit tests, benchmarks, and small devnets.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::types::{
    BlacklistEntry, Block, CanonicalDayProof, DayNumber, Epoch, ValidatorId, ValidatorSet,
};

use super::traits::{ConductorStore, StorageError};

#[derive(Default)]
struct Inner {
    blocks: HashMap<Epoch, Block>,
    day_proofs: HashMap<DayNumber, CanonicalDayProof>,
    blacklist: HashMap<ValidatorId, BlacklistEntry>,
    validator_sets: HashMap<DayNumber, ValidatorSet>,
    meta: HashMap<String, Vec<u8>>,
}

/// In-memory implementation of [`ConductorStore`].
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Write-once semantics: insert if absent, reject a distinct value at an
/// occupied key, accept an identical value as a no-op.
fn write_once<K, V>(map: &mut HashMap<K, V>, key: K, value: V, ns: &'static str) -> Result<(), StorageError>
where
    K: std::hash::Hash + Eq,
    V: PartialEq,
{
    match map.get(&key) {
        None => {
            map.insert(key, value);
            Ok(())
        }
        Some(existing) if existing == &value => Ok(()),
        Some(_) => Err(StorageError::Conflict(ns)),
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_bytes() == other.canonical_bytes()
    }
}

impl PartialEq for CanonicalDayProof {
    fn eq(&self, other: &Self) -> bool {
        self.day_proof.digest() == other.day_proof.digest()
            && self.day_proof.day_number() == other.day_proof.day_number()
    }
}

impl PartialEq for BlacklistEntry {
    fn eq(&self, other: &Self) -> bool {
        self.validator_id == other.validator_id
            && self.effective_day == other.effective_day
            && self.evidence_digest == other.evidence_digest
    }
}

impl ConductorStore for InMemoryStore {
    fn get_block(&self, epoch: Epoch) -> Result<Option<Block>, StorageError> {
        Ok(self.inner.read().blocks.get(&epoch).cloned())
    }

    fn put_block(&self, block: Block) -> Result<(), StorageError> {
        write_once(&mut self.inner.write().blocks, block.epoch, block, "block")
    }

    fn get_day_proof(&self, day: DayNumber) -> Result<Option<CanonicalDayProof>, StorageError> {
        Ok(self.inner.read().day_proofs.get(&day).cloned())
    }

    fn put_day_proof(&self, proof: CanonicalDayProof) -> Result<(), StorageError> {
        let day = proof.day_number();
        write_once(&mut self.inner.write().day_proofs, day, proof, "day_proof")
    }

    fn get_blacklist_entry(
        &self,
        validator_id: &ValidatorId,
    ) -> Result<Option<BlacklistEntry>, StorageError> {
        Ok(self.inner.read().blacklist.get(validator_id).cloned())
    }

    fn put_blacklist_entry(&self, entry: BlacklistEntry) -> Result<(), StorageError> {
        let id = entry.validator_id;
        write_once(&mut self.inner.write().blacklist, id, entry, "blacklist")
    }

    fn supersede_blacklist_entry(&self, entry: BlacklistEntry) -> Result<(), StorageError> {
        self.inner.write().blacklist.insert(entry.validator_id, entry);
        Ok(())
    }

    fn list_blacklist_entries(&self) -> Result<Vec<BlacklistEntry>, StorageError> {
        Ok(self.inner.read().blacklist.values().cloned().collect())
    }

    fn get_validator_set(&self, day: DayNumber) -> Result<Option<ValidatorSet>, StorageError> {
        Ok(self.inner.read().validator_sets.get(&day).cloned())
    }

    fn put_validator_set(&self, set: ValidatorSet) -> Result<(), StorageError> {
        let day = set.day;
        write_once(&mut self.inner.write().validator_sets, day, set, "validator_set")
    }

    fn get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.inner.read().meta.get(key).cloned())
    }

    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.inner.write().meta.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EventFingerprint, Hash256, QuorumCertificate, SignerBitmap, ValidatorMember};
    use std::collections::BTreeSet;

    fn dummy_qc() -> QuorumCertificate {
        QuorumCertificate {
            message_digest: Hash256::zero(),
            aggregate_signature: vec![],
            signer_set: SignerBitmap::new(1),
        }
    }

    fn dummy_block(epoch: Epoch) -> Block {
        Block {
            epoch,
            events: vec![EventFingerprint(Hash256([epoch as u8; 32]))],
            merkle_root: Hash256::zero(),
            proposer_set: BTreeSet::new(),
            quorum_certificate: dummy_qc(),
        }
    }

    #[test]
    fn put_and_get_block_roundtrip() {
        let store = InMemoryStore::new();
        let block = dummy_block(1);
        store.put_block(block.clone()).expect("put");
        let fetched = store.get_block(1).expect("get").expect("present");
        assert_eq!(fetched.epoch, block.epoch);
    }

    #[test]
    fn identical_rewrite_is_idempotent() {
        let store = InMemoryStore::new();
        let block = dummy_block(1);
        store.put_block(block.clone()).expect("first write");
        store.put_block(block).expect("identical rewrite must be a no-op");
    }

    #[test]
    fn conflicting_rewrite_is_rejected() {
        let store = InMemoryStore::new();
        store.put_block(dummy_block(1)).expect("first write");
        let mut conflicting = dummy_block(1);
        conflicting.merkle_root = Hash256([0xFFu8; 32]);
        let err = store.put_block(conflicting).unwrap_err();
        assert!(matches!(err, StorageError::Conflict("block")));
    }

    #[test]
    fn validator_set_roundtrip() {
        let store = InMemoryStore::new();
        let member = ValidatorMember {
            validator_id: ValidatorId(Hash256([1u8; 32])),
            join_epoch: 0,
            public_key_bytes: vec![1, 2, 3],
        };
        let set = ValidatorSet::new(3, vec![member]);
        store.put_validator_set(set.clone()).expect("put");
        let fetched = store.get_validator_set(3).expect("get").expect("present");
        assert_eq!(fetched.len(), 1);
    }

    #[test]
    fn meta_overwrite_is_not_write_once() {
        let store = InMemoryStore::new();
        store.put_meta("genesis_seed", b"a").expect("put");
        store.put_meta("genesis_seed", b"b").expect("overwrite");
        assert_eq!(store.get_meta("genesis_seed").unwrap().unwrap(), b"b");
    }
}
