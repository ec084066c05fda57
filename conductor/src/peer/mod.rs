//! Peer-to-peer wire format (§6 "Peer-to-peer", "Wire format discipline"):
//! the canonical signed envelope every gossiped message travels in, plus
//! the direct-unicast fragment-repair request/response pair.

pub mod message;

pub use message::{accept_envelope, FragmentRequest, FragmentResponse, PeerEnvelope, RejectReason};
