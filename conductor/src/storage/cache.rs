//! Volatile seen-message cache: rejects replays within a TTL window
//! keyed by `(sender, message_hash)` (§4.9, §4.12 default 24h).

use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::types::{Hash256, ValidatorId};

pub const DEFAULT_SEEN_MESSAGE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Bounded, TTL-expiring cache of `(sender, message_hash)` pairs. Not a
/// canonical namespace: nothing here is persisted, and a crash/restart
/// simply starts with an empty cache (the seen-message check is a replay
/// defense, not a safety property of consensus itself).
pub struct SeenMessageCache {
    entries: DashMap<(ValidatorId, Hash256), Instant>,
    ttl: Duration,
}

impl SeenMessageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Returns `true` if `(sender, message_hash)` had not been seen within
    /// the TTL window (and records it as seen now); `false` if it is a
    /// replay of a still-live entry.
    pub fn observe(&self, sender: ValidatorId, message_hash: Hash256) -> bool {
        let now = Instant::now();
        match self.entries.entry((sender, message_hash)) {
            Entry::Occupied(mut slot) => {
                if now.duration_since(*slot.get()) > self.ttl {
                    slot.insert(now);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }

    /// Drops entries whose TTL has elapsed. Intended to be called
    /// periodically rather than on every `observe`, to bound memory
    /// without paying the sweep cost on the hot path every time.
    pub fn sweep_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, seen_at| now.duration_since(*seen_at) <= self.ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SeenMessageCache {
    fn default() -> Self {
        Self::new(DEFAULT_SEEN_MESSAGE_TTL)
    }
}
