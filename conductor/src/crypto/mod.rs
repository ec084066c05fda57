//! Cryptographic primitives: sequential hashing / Merkle trees, long-lived
//! validator identity, and threshold cryptography.

pub mod hash;
pub mod identity;
pub mod threshold;

pub use identity::{Identity, IdentityError};
pub use threshold::{DecryptionShareBytes, KeyShare, SignatureShareBytes, ThresholdContext, ThresholdError};
