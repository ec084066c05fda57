//! Binary Byzantine agreement (§4.4): asynchronous one-bit consensus,
//! driven to liveness by the [`crate::coin`] common coin.

pub mod instance;

pub use instance::{BbaError, BbaInstance, BbaMessage, BbaOutbound};
