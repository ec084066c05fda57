//! Reliable broadcast state machine: Propose / Echo / Ready / Deliver.
//!
//! One [`RbcInstance`] runs per proposer in an epoch's ACS (§4.3, §4.5).
//! It is a pure message-driven state machine: callers feed it inbound
//! messages and it returns the outbound messages (and, eventually, the
//! delivered value) the caller is responsible for sending over the wire.
//! This keeps the agreement logic free of any I/O or peer-identity
//! concerns, which live in [`crate::peer`].

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::crypto::hash::MerkleProof;
use crate::types::Hash256;

use super::erasure::{ErasureCoder, ErasureError};
use super::merkle::{fragment_proof, fragment_root, verify_fragment};

#[derive(Debug)]
pub enum RbcError {
    Erasure(ErasureError),
    FragmentProofInvalid,
    FragmentIndexMismatch,
    RootMismatch,
}

impl From<ErasureError> for RbcError {
    fn from(e: ErasureError) -> Self {
        RbcError::Erasure(e)
    }
}

impl std::fmt::Display for RbcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RbcError::Erasure(e) => write!(f, "{e}"),
            RbcError::FragmentProofInvalid => write!(f, "fragment failed Merkle proof check"),
            RbcError::FragmentIndexMismatch => write!(f, "fragment index does not match sender"),
            RbcError::RootMismatch => write!(f, "fragment root does not match the instance's root"),
        }
    }
}

impl std::error::Error for RbcError {}

/// One erasure-coded fragment bound to its position via a Merkle proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub root: Hash256,
    pub original_len: usize,
    pub index: usize,
    pub shard: Vec<u8>,
    pub proof: MerkleProof,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum RbcMessage {
    Propose(Fragment),
    Echo(Fragment),
    Ready { root: Hash256 },
}

/// An action this instance asks its caller to perform. The initial
/// per-party Propose fan-out is returned directly by [`RbcInstance::propose`]
/// rather than through this type, since it addresses every recipient at
/// once rather than reacting to an inbound message.
pub enum RbcOutbound {
    Broadcast(RbcMessage),
    Deliver(Vec<u8>),
}

/// A single reliable-broadcast instance, identified by its proposer's
/// index in the active set. `local_index` is this node's own index.
pub struct RbcInstance {
    n: usize,
    f: usize,
    local_index: usize,
    coder: ErasureCoder,
    root: Option<Hash256>,
    original_len: Option<usize>,
    sent_echo: bool,
    echoes: HashMap<usize, Vec<u8>>,
    ready_senders: HashSet<usize>,
    sent_ready: bool,
    delivered: Option<Vec<u8>>,
}

impl RbcInstance {
    pub fn new(n: usize, f: usize, local_index: usize) -> Result<Self, RbcError> {
        let coder = ErasureCoder::for_committee(n, f)?;
        Ok(Self {
            n,
            f,
            local_index,
            coder,
            root: None,
            original_len: None,
            sent_echo: false,
            echoes: HashMap::new(),
            ready_senders: HashSet::new(),
            sent_ready: false,
            delivered: None,
        })
    }

    pub fn delivered(&self) -> Option<&[u8]> {
        self.delivered.as_deref()
    }

    /// Encodes `payload` and returns the per-party Propose messages the
    /// proposer sends point-to-point (one fragment per recipient).
    pub fn propose(&self, payload: &[u8]) -> Result<Vec<(usize, RbcMessage)>, RbcError> {
        let shards = self.coder.encode(payload)?;
        let root = fragment_root(&shards);
        let mut out = Vec::with_capacity(self.n);
        for (i, shard) in shards.iter().enumerate() {
            let proof = fragment_proof(&shards, i).expect("index within range");
            out.push((
                i,
                RbcMessage::Propose(Fragment {
                    root,
                    original_len: payload.len(),
                    index: i,
                    shard: shard.clone(),
                    proof,
                }),
            ));
        }
        Ok(out)
    }

    /// Handles the Propose addressed to this party; broadcasts an Echo
    /// of its own fragment if this is the first valid Propose seen.
    pub fn handle_propose(&mut self, fragment: Fragment) -> Result<Vec<RbcOutbound>, RbcError> {
        if fragment.index != self.local_index {
            return Err(RbcError::FragmentIndexMismatch);
        }
        if !verify_fragment(&fragment.shard, &fragment.proof, &fragment.root) {
            return Err(RbcError::FragmentProofInvalid);
        }
        if self.sent_echo {
            return Ok(Vec::new());
        }
        self.root = Some(fragment.root);
        self.original_len = Some(fragment.original_len);
        self.sent_echo = true;
        self.echoes.insert(self.local_index, fragment.shard.clone());
        Ok(vec![RbcOutbound::Broadcast(RbcMessage::Echo(fragment))])
    }

    /// Handles an Echo from `sender`. Once `n - f` consistent echoes are
    /// in and the payload decodes, broadcasts Ready.
    pub fn handle_echo(&mut self, sender: usize, fragment: Fragment) -> Result<Vec<RbcOutbound>, RbcError> {
        if fragment.index != sender {
            return Err(RbcError::FragmentIndexMismatch);
        }
        if !verify_fragment(&fragment.shard, &fragment.proof, &fragment.root) {
            return Err(RbcError::FragmentProofInvalid);
        }
        if let Some(root) = self.root {
            if root != fragment.root {
                return Err(RbcError::RootMismatch);
            }
        }
        self.root.get_or_insert(fragment.root);
        self.original_len.get_or_insert(fragment.original_len);
        self.echoes.entry(sender).or_insert(fragment.shard);

        let mut out = Vec::new();
        if !self.sent_ready && self.echoes.len() >= self.n - self.f && self.try_decode().is_some() {
            let root = self.root.expect("root known once a fragment has been seen");
            self.sent_ready = true;
            self.ready_senders.insert(self.local_index);
            out.push(RbcOutbound::Broadcast(RbcMessage::Ready { root }));
            out.extend(self.maybe_deliver());
        }
        Ok(out)
    }

    /// Handles a Ready from `sender`. Amplifies (sends its own Ready) once
    /// `f + 1` are seen, and delivers once `2f + 1` are seen.
    pub fn handle_ready(&mut self, sender: usize, root: Hash256) -> Result<Vec<RbcOutbound>, RbcError> {
        if let Some(known_root) = self.root {
            if known_root != root {
                return Err(RbcError::RootMismatch);
            }
        } else {
            self.root = Some(root);
        }
        self.ready_senders.insert(sender);

        let mut out = Vec::new();
        if !self.sent_ready && self.ready_senders.len() >= self.f + 1 {
            self.sent_ready = true;
            self.ready_senders.insert(self.local_index);
            out.push(RbcOutbound::Broadcast(RbcMessage::Ready { root }));
        }
        if self.ready_senders.len() >= 2 * self.f + 1 {
            out.extend(self.maybe_deliver());
        }
        Ok(out)
    }

    fn try_decode(&self) -> Option<Vec<u8>> {
        let original_len = self.original_len?;
        let shards: Vec<Option<Vec<u8>>> = (0..self.n).map(|i| self.echoes.get(&i).cloned()).collect();
        self.coder.reconstruct(shards, original_len).ok()
    }

    fn maybe_deliver(&mut self) -> Vec<RbcOutbound> {
        if self.delivered.is_some() {
            return Vec::new();
        }
        let Some(value) = self.try_decode() else {
            return Vec::new();
        };
        let Ok(shards) = self.coder.encode(&value) else {
            return Vec::new();
        };
        if Some(fragment_root(&shards)) != self.root {
            return Vec::new();
        }
        self.delivered = Some(value.clone());
        vec![RbcOutbound::Deliver(value)]
    }
}
