//! Canonical peer message envelope and acceptance rules (§6 "Peer-to-peer",
//! "Wire format discipline"). Every message gossiped between validators
//! carries `(sender_id, epoch_or_day, message_digest, signature)` and is
//! rejected on invalid signature, unknown sender, blacklist match, or a
//! seen-cache hit.

use serde::{Deserialize, Serialize};

use crate::crypto::identity::verify_signature;
use crate::storage::SeenMessageCache;
use crate::types::{Hash256, ValidatorId};

/// A signed, canonically-encoded peer message. `payload` is the bincode-2
/// encoding of the inner message (RBC/BBA traffic, a DayProof, an evidence
/// record, a blacklist ballot, ...); this module is agnostic to its shape
/// so the envelope and acceptance rules are shared across all of them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeerEnvelope {
    pub sender: ValidatorId,
    pub epoch_or_day: u64,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

impl PeerEnvelope {
    /// Bytes the signature is computed over: everything but the signature
    /// itself, so `message_digest` is reproducible by any verifier.
    fn signing_bytes(sender: &ValidatorId, epoch_or_day: u64, payload: &[u8]) -> Vec<u8> {
        let cfg = bincode::config::standard();
        #[derive(Serialize)]
        struct Unsigned<'a> {
            sender: &'a ValidatorId,
            epoch_or_day: u64,
            payload: &'a [u8],
        }
        let unsigned = Unsigned {
            sender,
            epoch_or_day,
            payload,
        };
        bincode::serde::encode_to_vec(&unsigned, cfg).expect("envelope must be serializable")
    }

    /// Builds and signs a new envelope using `sign`, the sender's own
    /// signing function (typically [`crate::crypto::identity::Identity::sign`]).
    pub fn new(
        sender: ValidatorId,
        epoch_or_day: u64,
        payload: Vec<u8>,
        sign: impl FnOnce(&[u8]) -> Vec<u8>,
    ) -> Self {
        let bytes = Self::signing_bytes(&sender, epoch_or_day, &payload);
        let signature = sign(&bytes);
        Self {
            sender,
            epoch_or_day,
            payload,
            signature,
        }
    }

    pub fn message_digest(&self) -> Hash256 {
        Hash256::compute(&Self::signing_bytes(&self.sender, self.epoch_or_day, &self.payload))
    }

    fn verify_signature(&self, sender_public_key: &[u8]) -> bool {
        let bytes = Self::signing_bytes(&self.sender, self.epoch_or_day, &self.payload);
        verify_signature(sender_public_key, &bytes, &self.signature).is_ok()
    }
}

/// Direct unicast request for one erasure-coded fragment a validator is
/// missing for `(epoch, proposer_index)`, e.g. after a restart or a
/// dropped gossip message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FragmentRequest {
    pub epoch: u64,
    pub proposer_index: usize,
    pub fragment_index: usize,
}

/// Response to a [`FragmentRequest`]: the requested fragment, encoded the
/// same way as an RBC `Propose`/`Echo` fragment (`None` if the responder
/// does not hold it).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FragmentResponse {
    pub epoch: u64,
    pub proposer_index: usize,
    pub fragment: Option<crate::rbc::Fragment>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RejectReason {
    InvalidSignature,
    UnknownSender,
    Blacklisted,
    Replay,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::InvalidSignature => write!(f, "invalid signature"),
            RejectReason::UnknownSender => write!(f, "unknown sender"),
            RejectReason::Blacklisted => write!(f, "sender is blacklisted"),
            RejectReason::Replay => write!(f, "message already seen"),
        }
    }
}

impl std::error::Error for RejectReason {}

/// Applies the acceptance rules from §6 to an inbound envelope.
///
/// `lookup_public_key` resolves a sender's current public key from the
/// active validator-set snapshot (`None` for an unknown sender);
/// `is_blacklisted` checks the current blacklist view. Order matters: an
/// unknown sender is rejected before a signature check is even attempted,
/// since there is no key to verify against.
pub fn accept_envelope(
    envelope: &PeerEnvelope,
    cache: &SeenMessageCache,
    lookup_public_key: impl FnOnce(&ValidatorId) -> Option<Vec<u8>>,
    is_blacklisted: impl FnOnce(&ValidatorId) -> bool,
) -> Result<(), RejectReason> {
    let Some(public_key) = lookup_public_key(&envelope.sender) else {
        return Err(RejectReason::UnknownSender);
    };
    if !envelope.verify_signature(&public_key) {
        return Err(RejectReason::InvalidSignature);
    }
    if is_blacklisted(&envelope.sender) {
        return Err(RejectReason::Blacklisted);
    }
    if !cache.observe(envelope.sender, envelope.message_digest()) {
        return Err(RejectReason::Replay);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::identity::Identity;
    use std::time::Duration;

    #[test]
    fn honest_envelope_is_accepted_once() {
        let identity = Identity::generate();
        let sender = identity.validator_id();
        let envelope = PeerEnvelope::new(sender, 7, b"payload".to_vec(), |bytes| identity.sign(bytes));
        let cache = SeenMessageCache::new(Duration::from_secs(60));

        let result = accept_envelope(
            &envelope,
            &cache,
            |_| Some(identity.public_key_bytes().to_vec()),
            |_| false,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn replayed_envelope_is_rejected() {
        let identity = Identity::generate();
        let sender = identity.validator_id();
        let envelope = PeerEnvelope::new(sender, 7, b"payload".to_vec(), |bytes| identity.sign(bytes));
        let cache = SeenMessageCache::new(Duration::from_secs(60));

        accept_envelope(&envelope, &cache, |_| Some(identity.public_key_bytes().to_vec()), |_| false)
            .expect("first delivery accepted");
        let result = accept_envelope(
            &envelope,
            &cache,
            |_| Some(identity.public_key_bytes().to_vec()),
            |_| false,
        );
        assert_eq!(result, Err(RejectReason::Replay));
    }

    #[test]
    fn tampered_payload_fails_signature_check() {
        let identity = Identity::generate();
        let sender = identity.validator_id();
        let mut envelope = PeerEnvelope::new(sender, 7, b"payload".to_vec(), |bytes| identity.sign(bytes));
        envelope.payload = b"tampered".to_vec();
        let cache = SeenMessageCache::new(Duration::from_secs(60));

        let result = accept_envelope(
            &envelope,
            &cache,
            |_| Some(identity.public_key_bytes().to_vec()),
            |_| false,
        );
        assert_eq!(result, Err(RejectReason::InvalidSignature));
    }

    #[test]
    fn unknown_sender_is_rejected_before_signature_check() {
        let identity = Identity::generate();
        let sender = identity.validator_id();
        let envelope = PeerEnvelope::new(sender, 7, b"payload".to_vec(), |bytes| identity.sign(bytes));
        let cache = SeenMessageCache::new(Duration::from_secs(60));

        let result = accept_envelope(&envelope, &cache, |_| None, |_| false);
        assert_eq!(result, Err(RejectReason::UnknownSender));
    }

    #[test]
    fn blacklisted_sender_is_rejected() {
        let identity = Identity::generate();
        let sender = identity.validator_id();
        let envelope = PeerEnvelope::new(sender, 7, b"payload".to_vec(), |bytes| identity.sign(bytes));
        let cache = SeenMessageCache::new(Duration::from_secs(60));

        let result = accept_envelope(
            &envelope,
            &cache,
            |_| Some(identity.public_key_bytes().to_vec()),
            |_| true,
        );
        assert_eq!(result, Err(RejectReason::Blacklisted));
    }
}
