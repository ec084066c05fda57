//! Asynchronous common subset (§4.5): composes `n` reliable-broadcast
//! instances (one per proposer) with `n` binary Byzantine agreement
//! instances to output a subset of proposals of size at least `n - f`.
//!
//! Each proposer's payload is reliably broadcast. As soon as a party
//! delivers proposer `j`'s value, it inputs `1` to BBA instance `j`. Once
//! `n - f` of the BBA instances have decided `1`, any BBA instance not
//! yet started is force-started with input `0`, guaranteeing every
//! instance eventually decides. The agreed subset is the payloads of
//! every proposer whose BBA instance decided `1`.

use std::collections::BTreeMap;

use crate::bba::{BbaError, BbaInstance, BbaMessage, BbaOutbound};
use crate::crypto::threshold::ThresholdContext;
use crate::rbc::{Fragment, RbcError, RbcInstance, RbcMessage, RbcOutbound};
use crate::types::Epoch;

#[derive(Debug)]
pub enum AcsError {
    Rbc(RbcError),
    Bba(BbaError),
}

impl From<RbcError> for AcsError {
    fn from(e: RbcError) -> Self {
        AcsError::Rbc(e)
    }
}

impl From<BbaError> for AcsError {
    fn from(e: BbaError) -> Self {
        AcsError::Bba(e)
    }
}

impl std::fmt::Display for AcsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcsError::Rbc(e) => write!(f, "{e}"),
            AcsError::Bba(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for AcsError {}

/// An action the caller (the epoch orchestrator / peer layer) must act
/// on: send a message, or observe that the subset has finalized.
pub enum AcsOutbound {
    RbcSendTo { proposer: usize, target: usize, message: RbcMessage },
    RbcBroadcast { proposer: usize, message: RbcMessage },
    BbaBroadcast { proposer: usize, message: BbaMessage },
}

pub struct AcsInstance {
    n: usize,
    f: usize,
    local_index: usize,
    epoch: Epoch,
    rbc: Vec<RbcInstance>,
    bba: Vec<Option<BbaInstance>>,
    bba_decided: Vec<Option<bool>>,
    decided_ones: usize,
    force_terminated: bool,
    rbc_delivered: Vec<Option<Vec<u8>>>,
    finalized: Option<BTreeMap<usize, Vec<u8>>>,
}

impl AcsInstance {
    /// Creates the instance and immediately encodes/broadcasts this
    /// party's own proposal through its RBC instance.
    pub fn new(
        n: usize,
        f: usize,
        local_index: usize,
        epoch: Epoch,
        own_payload: &[u8],
    ) -> Result<(Self, Vec<AcsOutbound>), AcsError> {
        let rbc: Vec<RbcInstance> = (0..n)
            .map(|_| RbcInstance::new(n, f, local_index))
            .collect::<Result<_, _>>()?;

        let mut instance = Self {
            n,
            f,
            local_index,
            epoch,
            rbc,
            bba: (0..n).map(|_| None).collect(),
            bba_decided: vec![None; n],
            decided_ones: 0,
            force_terminated: false,
            rbc_delivered: vec![None; n],
            finalized: None,
        };

        let proposals = instance.rbc[local_index].propose(own_payload)?;
        let mut out = Vec::new();
        for (target, message) in proposals {
            out.push(AcsOutbound::RbcSendTo {
                proposer: local_index,
                target,
                message,
            });
        }
        Ok((instance, out))
    }

    pub fn result(&self) -> Option<&BTreeMap<usize, Vec<u8>>> {
        self.finalized.as_ref()
    }

    pub fn handle_rbc_propose(
        &mut self,
        proposer: usize,
        fragment: Fragment,
    ) -> Result<Vec<AcsOutbound>, AcsError> {
        let events = self.rbc[proposer].handle_propose(fragment)?;
        Ok(self.drain_rbc_events(proposer, events))
    }

    pub fn handle_rbc_echo(
        &mut self,
        proposer: usize,
        sender: usize,
        fragment: Fragment,
    ) -> Result<Vec<AcsOutbound>, AcsError> {
        let events = self.rbc[proposer].handle_echo(sender, fragment)?;
        Ok(self.drain_rbc_events(proposer, events))
    }

    pub fn handle_rbc_ready(
        &mut self,
        proposer: usize,
        sender: usize,
        root: crate::types::Hash256,
    ) -> Result<Vec<AcsOutbound>, AcsError> {
        let events = self.rbc[proposer].handle_ready(sender, root)?;
        Ok(self.drain_rbc_events(proposer, events))
    }

    fn drain_rbc_events(&mut self, proposer: usize, events: Vec<RbcOutbound>) -> Vec<AcsOutbound> {
        let mut out = Vec::new();
        for event in events {
            match event {
                RbcOutbound::Broadcast(message) => {
                    out.push(AcsOutbound::RbcBroadcast { proposer, message })
                }
                RbcOutbound::Deliver(payload) => {
                    self.rbc_delivered[proposer] = Some(payload);
                    if self.bba[proposer].is_none() {
                        out.extend(self.start_bba(proposer, true));
                    }
                    self.try_finalize();
                }
            }
        }
        out
    }

    fn start_bba(&mut self, proposer: usize, estimate: bool) -> Vec<AcsOutbound> {
        if self.bba[proposer].is_some() {
            return Vec::new();
        }
        let mut instance = BbaInstance::new(self.n, self.f, self.local_index, self.epoch, proposer, estimate);
        let actions = instance.start();
        self.bba[proposer] = Some(instance);
        actions
            .into_iter()
            .filter_map(|a| match a {
                BbaOutbound::Broadcast(message) => Some(AcsOutbound::BbaBroadcast { proposer, message }),
                BbaOutbound::Decided(_) => None,
            })
            .collect()
    }

    pub fn handle_bba_bval(
        &mut self,
        proposer: usize,
        sender: usize,
        round: u32,
        value: bool,
        ctx: &ThresholdContext,
    ) -> Result<Vec<AcsOutbound>, AcsError> {
        let mut out = self.ensure_bba_started(proposer);
        let events = self.bba[proposer]
            .as_mut()
            .expect("started above")
            .handle_bval(sender, round, value, ctx)?;
        out.extend(self.drain_bba_events(proposer, events));
        Ok(out)
    }

    pub fn handle_bba_aux(
        &mut self,
        proposer: usize,
        sender: usize,
        round: u32,
        value: bool,
        ctx: &ThresholdContext,
    ) -> Result<Vec<AcsOutbound>, AcsError> {
        let mut out = self.ensure_bba_started(proposer);
        let events = self.bba[proposer]
            .as_mut()
            .expect("started above")
            .handle_aux(sender, round, value, ctx)?;
        out.extend(self.drain_bba_events(proposer, events));
        Ok(out)
    }

    pub fn handle_bba_coin(
        &mut self,
        proposer: usize,
        sender: usize,
        round: u32,
        share: Vec<u8>,
        ctx: &ThresholdContext,
    ) -> Result<Vec<AcsOutbound>, AcsError> {
        let mut out = self.ensure_bba_started(proposer);
        let events = self.bba[proposer]
            .as_mut()
            .expect("started above")
            .handle_coin_share(sender, round, share, ctx)?;
        out.extend(self.drain_bba_events(proposer, events));
        Ok(out)
    }

    /// A remote party may start seeing BBA traffic for proposer `j`
    /// before this party's own RBC for `j` has delivered; BBA must still
    /// participate, with an estimate of `false` until delivery happens.
    fn ensure_bba_started(&mut self, proposer: usize) -> Vec<AcsOutbound> {
        if self.bba[proposer].is_none() {
            self.start_bba(proposer, false)
        } else {
            Vec::new()
        }
    }

    fn drain_bba_events(&mut self, proposer: usize, events: Vec<BbaOutbound>) -> Vec<AcsOutbound> {
        let mut out = Vec::new();
        for event in events {
            match event {
                BbaOutbound::Broadcast(message) => {
                    out.push(AcsOutbound::BbaBroadcast { proposer, message })
                }
                BbaOutbound::Decided(bit) => {
                    self.bba_decided[proposer] = Some(bit);
                    if bit {
                        self.decided_ones += 1;
                    }
                    if !self.force_terminated && self.decided_ones >= self.n - self.f {
                        self.force_terminated = true;
                        for j in 0..self.n {
                            if self.bba_decided[j].is_none() {
                                out.extend(self.start_bba(j, false));
                            }
                        }
                    }
                    self.try_finalize();
                }
            }
        }
        out
    }

    fn try_finalize(&mut self) {
        if self.finalized.is_some() {
            return;
        }
        if self.bba_decided.iter().any(Option::is_none) {
            return;
        }
        let mut subset = BTreeMap::new();
        for j in 0..self.n {
            if self.bba_decided[j] == Some(true) {
                match &self.rbc_delivered[j] {
                    Some(payload) => {
                        subset.insert(j, payload.clone());
                    }
                    None => return,
                }
            }
        }
        self.finalized = Some(subset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Runs a full 4-party (n=4, f=1) ACS round where every party
    /// proposes its own payload and all are honest and prompt: the
    /// finalized subset should include all four proposals.
    #[test]
    fn four_honest_proposers_all_land_in_the_subset() {
        const N: usize = 4;
        const F: usize = 1;
        const EPOCH: Epoch = 42;

        let contexts = ThresholdContext::deal(N, F);
        let payloads: Vec<Vec<u8>> = (0..N)
            .map(|i| format!("epoch-{EPOCH}-proposal-{i}").into_bytes())
            .collect();

        let mut instances: Vec<AcsInstance> = Vec::with_capacity(N);
        let mut queue: VecDeque<(usize, AcsOutbound)> = VecDeque::new();

        for p in 0..N {
            let (instance, initial) =
                AcsInstance::new(N, F, p, EPOCH, &payloads[p]).expect("valid committee");
            instances.push(instance);
            for action in initial {
                queue.push_back((p, action));
            }
        }

        while let Some((origin, action)) = queue.pop_front() {
            match action {
                AcsOutbound::RbcSendTo { proposer, target, message } => {
                    let RbcMessage::Propose(fragment) = message else {
                        unreachable!("fan-out only ever carries Propose")
                    };
                    let out = instances[target]
                        .handle_rbc_propose(proposer, fragment)
                        .expect("valid propose");
                    for a in out {
                        queue.push_back((target, a));
                    }
                }
                AcsOutbound::RbcBroadcast { proposer, message } => {
                    for target in 0..N {
                        let out = match message.clone() {
                            RbcMessage::Echo(fragment) => instances[target]
                                .handle_rbc_echo(proposer, origin, fragment)
                                .expect("valid echo"),
                            RbcMessage::Ready { root } => instances[target]
                                .handle_rbc_ready(proposer, origin, root)
                                .expect("valid ready"),
                            RbcMessage::Propose(_) => unreachable!("never broadcast"),
                        };
                        for a in out {
                            queue.push_back((target, a));
                        }
                    }
                }
                AcsOutbound::BbaBroadcast { proposer, message } => {
                    for target in 0..N {
                        let out = match message.clone() {
                            BbaMessage::BVal { round, value } => instances[target]
                                .handle_bba_bval(proposer, origin, round, value, &contexts[target])
                                .expect("valid bval"),
                            BbaMessage::Aux { round, value } => instances[target]
                                .handle_bba_aux(proposer, origin, round, value, &contexts[target])
                                .expect("valid aux"),
                            BbaMessage::Coin { round, share } => instances[target]
                                .handle_bba_coin(proposer, origin, round, share, &contexts[target])
                                .expect("valid coin share"),
                        };
                        for a in out {
                            queue.push_back((target, a));
                        }
                    }
                }
            }
        }

        for (i, instance) in instances.iter().enumerate() {
            let subset = instance
                .result()
                .unwrap_or_else(|| panic!("party {i} failed to finalize a subset"));
            assert!(subset.len() >= N - F);
            for (&proposer, payload) in subset {
                assert_eq!(payload, &payloads[proposer]);
            }
        }
    }
}
