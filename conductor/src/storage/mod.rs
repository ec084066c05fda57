//! Storage backends for the consensus core.
//!
//! Two logical kinds of state (§4.9):
//!
//! - canonical state, behind [`traits::ConductorStore`]: write-once,
//!   idempotent records under `block/`, `day_proof/`, `blacklist/`,
//!   `validator_set/`, and `meta/`;
//! - volatile caches, e.g. [`cache::SeenMessageCache`], which are never
//!   persisted and exist purely to bound replay/duplicate work.

pub mod cache;
pub mod mem;
pub mod rocksdb;
pub mod traits;

pub use cache::SeenMessageCache;
pub use mem::InMemoryStore;
pub use rocksdb::{RocksDbConfig, RocksDbStore};
pub use traits::{ConductorStore, StorageError};
