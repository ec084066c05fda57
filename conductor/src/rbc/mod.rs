//! Reliable broadcast (§4.3): erasure-coded Propose/Echo/Ready/Deliver,
//! guaranteeing that honest parties either all deliver the same value
//! from a proposer or none does.

pub mod erasure;
pub mod instance;
pub mod merkle;

pub use erasure::{ErasureCoder, ErasureError};
pub use instance::{Fragment, RbcError, RbcInstance, RbcMessage, RbcOutbound};
