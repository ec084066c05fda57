//! Long-lived validator identity: an Ed25519 signing keypair used for
//! peer-message authentication and `DayProof::proposer_signature`,
//! distinct from the per-epoch threshold shares in [`super::threshold`].

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::types::ids::ValidatorId;

#[derive(Debug)]
pub enum IdentityError {
    MalformedSignature,
    MalformedPublicKey,
    VerificationFailed,
}

impl std::fmt::Display for IdentityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityError::MalformedSignature => write!(f, "malformed signature bytes"),
            IdentityError::MalformedPublicKey => write!(f, "malformed public key bytes"),
            IdentityError::VerificationFailed => write!(f, "signature verification failed"),
        }
    }
}

impl std::error::Error for IdentityError {}

/// A validator's long-lived signing identity.
pub struct Identity {
    signing_key: SigningKey,
}

impl Identity {
    /// Generates a fresh identity. Used at join time; the resulting
    /// [`ValidatorId`] is derived from the public key and is permanent.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    pub fn from_signing_key_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    pub fn validator_id(&self) -> ValidatorId {
        ValidatorId::from_public_key(self.signing_key.verifying_key().as_bytes())
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }
}

/// Verifies a detached signature against a known public key. This is the
/// stateless half of identity verification, used by peers who only hold
/// the signer's public key (e.g. from the active validator-set snapshot).
pub fn verify_signature(
    public_key_bytes: &[u8],
    message: &[u8],
    signature_bytes: &[u8],
) -> Result<(), IdentityError> {
    let pk_array: [u8; 32] = public_key_bytes
        .try_into()
        .map_err(|_| IdentityError::MalformedPublicKey)?;
    let verifying_key =
        VerifyingKey::from_bytes(&pk_array).map_err(|_| IdentityError::MalformedPublicKey)?;
    let sig_array: [u8; 64] = signature_bytes
        .try_into()
        .map_err(|_| IdentityError::MalformedSignature)?;
    let signature = Signature::from_bytes(&sig_array);
    verifying_key
        .verify(message, &signature)
        .map_err(|_| IdentityError::VerificationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_roundtrips() {
        let identity = Identity::generate();
        let message = b"day-proof-digest";
        let sig = identity.sign(message);
        assert!(verify_signature(&identity.public_key_bytes(), message, &sig).is_ok());
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let identity = Identity::generate();
        let sig = identity.sign(b"original");
        assert!(verify_signature(&identity.public_key_bytes(), b"tampered", &sig).is_err());
    }

    #[test]
    fn validator_id_is_stable_across_calls() {
        let identity = Identity::generate();
        assert_eq!(identity.validator_id(), identity.validator_id());
    }
}
