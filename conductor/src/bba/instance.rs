//! Binary Byzantine agreement (§4.4): asynchronous consensus on one bit,
//! using bin-values/BVAL/AUX rounds and a common coin for liveness.

use std::collections::{HashMap, HashSet};

use crate::coin::{combine_coin, sign_coin_share};
use crate::crypto::threshold::{SignatureShareBytes, ThresholdContext, ThresholdError};
use crate::types::Epoch;

#[derive(Debug)]
pub enum BbaError {
    Threshold(ThresholdError),
}

impl From<ThresholdError> for BbaError {
    fn from(e: ThresholdError) -> Self {
        BbaError::Threshold(e)
    }
}

impl std::fmt::Display for BbaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BbaError::Threshold(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for BbaError {}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BbaMessage {
    BVal { round: u32, value: bool },
    Aux { round: u32, value: bool },
    Coin { round: u32, share: Vec<u8> },
}

pub enum BbaOutbound {
    Broadcast(BbaMessage),
    Decided(bool),
}

#[derive(Default)]
struct RoundState {
    bval_counts: HashMap<bool, HashSet<usize>>,
    sent_bval: HashSet<bool>,
    bin_values: HashSet<bool>,
    aux_received: HashMap<usize, bool>,
    aux_sent: bool,
    coin_requested: bool,
    coin_shares: HashMap<usize, SignatureShareBytes>,
    gated_vals: Option<HashSet<bool>>,
    resolved: bool,
}

/// One instance of asynchronous binary agreement, identified by
/// `(epoch, instance_id)` — `instance_id` indexes the RBC proposer this
/// BBA instance is deciding "did we deliver from this proposer?" for,
/// inside the outer ACS composition (§4.5).
pub struct BbaInstance {
    n: usize,
    f: usize,
    local_index: usize,
    epoch: Epoch,
    instance_id: usize,
    round: u32,
    est: bool,
    rounds: HashMap<u32, RoundState>,
    decided: Option<bool>,
}

impl BbaInstance {
    pub fn new(
        n: usize,
        f: usize,
        local_index: usize,
        epoch: Epoch,
        instance_id: usize,
        initial_estimate: bool,
    ) -> Self {
        Self {
            n,
            f,
            local_index,
            epoch,
            instance_id,
            round: 0,
            est: initial_estimate,
            rounds: HashMap::new(),
            decided: None,
        }
    }

    pub fn decided(&self) -> Option<bool> {
        self.decided
    }

    fn round_mut(&mut self, round: u32) -> &mut RoundState {
        self.rounds.entry(round).or_default()
    }

    /// Kicks off the instance by broadcasting this party's initial
    /// estimate as round-0 BVAL.
    pub fn start(&mut self) -> Vec<BbaOutbound> {
        let round = self.round;
        let est = self.est;
        let state = self.round_mut(round);
        state.sent_bval.insert(est);
        vec![BbaOutbound::Broadcast(BbaMessage::BVal { round, value: est })]
    }

    pub fn handle_bval(
        &mut self,
        sender: usize,
        round: u32,
        value: bool,
        ctx: &ThresholdContext,
    ) -> Result<Vec<BbaOutbound>, BbaError> {
        let f = self.f;
        let mut out = Vec::new();

        let state = self.round_mut(round);
        state.bval_counts.entry(value).or_default().insert(sender);
        let count = state.bval_counts[&value].len();

        if count >= f + 1 && !state.sent_bval.contains(&value) {
            state.sent_bval.insert(value);
            out.push(BbaOutbound::Broadcast(BbaMessage::BVal { round, value }));
        }

        if count >= 2 * f + 1 {
            state.bin_values.insert(value);
            if !state.aux_sent {
                state.aux_sent = true;
                out.push(BbaOutbound::Broadcast(BbaMessage::Aux { round, value }));
            }
        }

        out.extend(self.maybe_request_coin(round, ctx)?);
        Ok(out)
    }

    pub fn handle_aux(
        &mut self,
        sender: usize,
        round: u32,
        value: bool,
        ctx: &ThresholdContext,
    ) -> Result<Vec<BbaOutbound>, BbaError> {
        let state = self.round_mut(round);
        state.aux_received.insert(sender, value);
        self.maybe_request_coin(round, ctx)
    }

    /// Checks whether enough AUX messages (`n - f`, restricted to values
    /// already in `bin_values`) have arrived to request this round's coin.
    fn maybe_request_coin(
        &mut self,
        round: u32,
        ctx: &ThresholdContext,
    ) -> Result<Vec<BbaOutbound>, BbaError> {
        let n = self.n;
        let f = self.f;
        let local_index = self.local_index;
        let epoch = self.epoch;
        let instance_id = self.instance_id;

        let state = self.round_mut(round);
        if state.coin_requested || state.bin_values.is_empty() {
            return Ok(Vec::new());
        }
        let matching: Vec<bool> = state
            .aux_received
            .values()
            .filter(|v| state.bin_values.contains(v))
            .copied()
            .collect();
        if matching.len() < n - f {
            return Ok(Vec::new());
        }
        state.gated_vals = Some(matching.into_iter().collect());
        state.coin_requested = true;

        let share = sign_coin_share(ctx, epoch, instance_id, round)?;
        state.coin_shares.insert(local_index, share.clone());
        Ok(vec![BbaOutbound::Broadcast(BbaMessage::Coin {
            round,
            share: share.bytes,
        })])
    }

    pub fn handle_coin_share(
        &mut self,
        sender: usize,
        round: u32,
        share_bytes: Vec<u8>,
        ctx: &ThresholdContext,
    ) -> Result<Vec<BbaOutbound>, BbaError> {
        let threshold = ctx.threshold();
        let state = self.round_mut(round);
        if state.resolved {
            return Ok(Vec::new());
        }
        state.coin_shares.insert(
            sender,
            SignatureShareBytes {
                index: sender,
                bytes: share_bytes,
            },
        );

        let Some(vals) = state.gated_vals.clone() else {
            return Ok(Vec::new());
        };
        if state.coin_shares.len() < threshold {
            return Ok(Vec::new());
        }

        let shares: Vec<SignatureShareBytes> = state.coin_shares.values().cloned().collect();
        let coin_bit = combine_coin(ctx, self.epoch, self.instance_id, round, &shares)?;

        self.round_mut(round).resolved = true;

        let (next_estimate, decision) = if vals.len() == 1 {
            let v = *vals.iter().next().expect("non-empty");
            if v == coin_bit {
                (v, Some(v))
            } else {
                (v, None)
            }
        } else {
            (coin_bit, None)
        };

        let mut out = Vec::new();
        if let Some(v) = decision {
            if self.decided.is_none() {
                self.decided = Some(v);
                out.push(BbaOutbound::Decided(v));
            }
        }

        if self.decided.is_none() {
            self.round = round + 1;
            self.est = next_estimate;
            let next_round = self.round;
            let est = self.est;
            let next_state = self.round_mut(next_round);
            next_state.sent_bval.insert(est);
            out.push(BbaOutbound::Broadcast(BbaMessage::BVal {
                round: next_round,
                value: est,
            }));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Runs a 4-party (n=4, f=1) BBA instance where every party proposes
    /// the same initial estimate; it must decide that value without
    /// needing the coin to resolve any ambiguity.
    #[test]
    fn unanimous_estimate_decides_without_disagreement() {
        const N: usize = 4;
        const F: usize = 1;
        let contexts = ThresholdContext::deal(N, F);
        let epoch = 3;
        let instance_id = 0;

        let mut parties: Vec<BbaInstance> = (0..N)
            .map(|i| BbaInstance::new(N, F, i, epoch, instance_id, true))
            .collect();

        let mut bval_queue: Vec<(usize, usize, u32, bool)> = Vec::new();
        for i in 0..N {
            for action in parties[i].start() {
                if let BbaOutbound::Broadcast(BbaMessage::BVal { round, value }) = action {
                    for target in 0..N {
                        bval_queue.push((i, target, round, value));
                    }
                }
            }
        }

        let mut aux_queue: Vec<(usize, usize, u32, bool)> = Vec::new();
        let mut coin_queue: Vec<(usize, usize, u32, Vec<u8>)> = Vec::new();

        while let Some((sender, target, round, value)) = bval_queue.pop() {
            let out = parties[target]
                .handle_bval(sender, round, value, &contexts[target])
                .expect("valid bval");
            for action in out {
                match action {
                    BbaOutbound::Broadcast(BbaMessage::BVal { round, value }) => {
                        for t in 0..N {
                            bval_queue.push((target, t, round, value));
                        }
                    }
                    BbaOutbound::Broadcast(BbaMessage::Aux { round, value }) => {
                        for t in 0..N {
                            aux_queue.push((target, t, round, value));
                        }
                    }
                    BbaOutbound::Broadcast(BbaMessage::Coin { round, share }) => {
                        for t in 0..N {
                            coin_queue.push((target, t, round, share.clone()));
                        }
                    }
                    BbaOutbound::Decided(_) => {}
                }
            }

            while let Some((sender, target, round, value)) = aux_queue.pop() {
                let out = parties[target]
                    .handle_aux(sender, round, value, &contexts[target])
                    .expect("valid aux");
                for action in out {
                    if let BbaOutbound::Broadcast(BbaMessage::Coin { round, share }) = action {
                        for t in 0..N {
                            coin_queue.push((target, t, round, share.clone()));
                        }
                    }
                }
            }

            while let Some((sender, target, round, share)) = coin_queue.pop() {
                let out = parties[target]
                    .handle_coin_share(sender, round, share, &contexts[target])
                    .expect("valid coin share");
                for action in out {
                    match action {
                        BbaOutbound::Broadcast(BbaMessage::BVal { round, value }) => {
                            for t in 0..N {
                                bval_queue.push((target, t, round, value));
                            }
                        }
                        BbaOutbound::Broadcast(BbaMessage::Aux { round, value }) => {
                            for t in 0..N {
                                aux_queue.push((target, t, round, value));
                            }
                        }
                        BbaOutbound::Broadcast(BbaMessage::Coin { round, share }) => {
                            for t in 0..N {
                                coin_queue.push((target, t, round, share.clone()));
                            }
                        }
                        BbaOutbound::Decided(_) => {}
                    }
                }
            }
        }

        for party in &parties {
            assert_eq!(party.decided(), Some(true));
        }
    }
}
