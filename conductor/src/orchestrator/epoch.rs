//! Epoch orchestrator (§4.6, §9): drives one [`AcsInstance`] from
//! `AWAIT_BATCHES` through `RBC_RUNNING`, `BBA_RUNNING`, `COMMITTING`, to
//! `DONE`, expressed as an explicit state machine so crash-restart
//! recovery can re-derive where to resume purely from storage.

use crate::acs::{AcsError, AcsInstance, AcsOutbound};
use crate::crypto::threshold::{SignatureShareBytes, ThresholdContext};
use crate::orchestrator::ordering::{self, OrderingError};
use crate::storage::{ConductorStore, StorageError};
use crate::types::{Block, Epoch, QuorumCertificate, SignerBitmap, ValidatorId};

/// The states named in §9's coroutine control flow.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EpochState {
    AwaitBatches,
    RbcRunning,
    BbaRunning,
    Committing,
    Done,
}

#[derive(Debug)]
pub enum EpochError {
    Acs(AcsError),
    Ordering(OrderingError),
    Storage(StorageError),
    /// A commit for this epoch already landed; writes are idempotent
    /// keyed by epoch (§4.6 step 7).
    AlreadyCommitted(Epoch),
    /// Epoch `e+1` cannot commit before epoch `e` (§4.6, epoch transition).
    OutOfOrder { epoch: Epoch, last_committed: Option<Epoch> },
    InsufficientQuorum { required: usize, provided: usize },
    /// The method called does not apply in the orchestrator's current state.
    WrongState { expected: EpochState, actual: EpochState },
}

impl std::fmt::Display for EpochError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EpochError::Acs(e) => write!(f, "{e}"),
            EpochError::Ordering(e) => write!(f, "{e}"),
            EpochError::Storage(e) => write!(f, "{e}"),
            EpochError::AlreadyCommitted(epoch) => write!(f, "epoch {epoch} already committed"),
            EpochError::OutOfOrder { epoch, last_committed } => {
                write!(f, "cannot commit epoch {epoch} before prior epoch (last committed: {last_committed:?})")
            }
            EpochError::InsufficientQuorum { required, provided } => {
                write!(f, "insufficient quorum: need {required}, got {provided}")
            }
            EpochError::WrongState { expected, actual } => {
                write!(f, "expected state {expected:?}, orchestrator is in {actual:?}")
            }
        }
    }
}

impl std::error::Error for EpochError {}

impl From<AcsError> for EpochError {
    fn from(e: AcsError) -> Self {
        EpochError::Acs(e)
    }
}

impl From<OrderingError> for EpochError {
    fn from(e: OrderingError) -> Self {
        EpochError::Ordering(e)
    }
}

impl From<StorageError> for EpochError {
    fn from(e: StorageError) -> Self {
        EpochError::Storage(e)
    }
}

const LAST_COMMITTED_EPOCH_KEY: &str = "last_committed_epoch";

/// Reads `meta/last_committed_epoch` to determine the next epoch to run,
/// the crash-restart recovery step named in §9: "begin from
/// `AWAIT_BATCHES` for the next epoch".
pub fn recover_next_epoch(store: &dyn ConductorStore) -> Result<Epoch, StorageError> {
    match store.get_meta(LAST_COMMITTED_EPOCH_KEY)? {
        Some(bytes) => {
            let arr: [u8; 8] = bytes
                .try_into()
                .map_err(|_| StorageError::Corrupted(LAST_COMMITTED_EPOCH_KEY))?;
            Ok(u64::from_be_bytes(arr) + 1)
        }
        None => Ok(0),
    }
}

fn last_committed_epoch(store: &dyn ConductorStore) -> Result<Option<Epoch>, StorageError> {
    match store.get_meta(LAST_COMMITTED_EPOCH_KEY)? {
        Some(bytes) => {
            let arr: [u8; 8] = bytes
                .try_into()
                .map_err(|_| StorageError::Corrupted(LAST_COMMITTED_EPOCH_KEY))?;
            Ok(Some(u64::from_be_bytes(arr)))
        }
        None => Ok(None),
    }
}

/// Drives one epoch's agreement and commit.
pub struct EpochOrchestrator {
    epoch: Epoch,
    n: usize,
    f: usize,
    local_index: usize,
    state: EpochState,
    acs: AcsInstance,
}

impl EpochOrchestrator {
    /// Begins RBC for this epoch with the local validator's own batch
    /// payload, transitioning `AWAIT_BATCHES -> RBC_RUNNING`.
    pub fn start(
        n: usize,
        f: usize,
        local_index: usize,
        epoch: Epoch,
        own_batch_payload: &[u8],
    ) -> Result<(Self, Vec<AcsOutbound>), EpochError> {
        let (acs, initial) = AcsInstance::new(n, f, local_index, epoch, own_batch_payload)?;
        let orchestrator = Self {
            epoch,
            n,
            f,
            local_index,
            state: EpochState::RbcRunning,
            acs,
        };
        Ok((orchestrator, initial))
    }

    pub fn state(&self) -> EpochState {
        self.state
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    fn advance_state_from_acs(&mut self) {
        if self.acs.result().is_some() {
            self.state = EpochState::Committing;
        } else if self.state == EpochState::RbcRunning {
            self.state = EpochState::BbaRunning;
        }
    }

    pub fn handle_rbc_propose(&mut self, proposer: usize, fragment: crate::rbc::Fragment) -> Result<Vec<AcsOutbound>, EpochError> {
        let out = self.acs.handle_rbc_propose(proposer, fragment)?;
        self.advance_state_from_acs();
        Ok(out)
    }

    pub fn handle_rbc_echo(
        &mut self,
        proposer: usize,
        sender: usize,
        fragment: crate::rbc::Fragment,
    ) -> Result<Vec<AcsOutbound>, EpochError> {
        let out = self.acs.handle_rbc_echo(proposer, sender, fragment)?;
        self.advance_state_from_acs();
        Ok(out)
    }

    pub fn handle_rbc_ready(
        &mut self,
        proposer: usize,
        sender: usize,
        root: crate::types::Hash256,
    ) -> Result<Vec<AcsOutbound>, EpochError> {
        let out = self.acs.handle_rbc_ready(proposer, sender, root)?;
        self.advance_state_from_acs();
        Ok(out)
    }

    pub fn handle_bba_bval(
        &mut self,
        proposer: usize,
        sender: usize,
        round: u32,
        value: bool,
        ctx: &ThresholdContext,
    ) -> Result<Vec<AcsOutbound>, EpochError> {
        let out = self.acs.handle_bba_bval(proposer, sender, round, value, ctx)?;
        self.advance_state_from_acs();
        Ok(out)
    }

    pub fn handle_bba_aux(
        &mut self,
        proposer: usize,
        sender: usize,
        round: u32,
        value: bool,
        ctx: &ThresholdContext,
    ) -> Result<Vec<AcsOutbound>, EpochError> {
        let out = self.acs.handle_bba_aux(proposer, sender, round, value, ctx)?;
        self.advance_state_from_acs();
        Ok(out)
    }

    pub fn handle_bba_coin(
        &mut self,
        proposer: usize,
        sender: usize,
        round: u32,
        share: Vec<u8>,
        ctx: &ThresholdContext,
    ) -> Result<Vec<AcsOutbound>, EpochError> {
        let out = self.acs.handle_bba_coin(proposer, sender, round, share, ctx)?;
        self.advance_state_from_acs();
        Ok(out)
    }

    /// `true` once ACS has finalized a subset and `finalize` may be called.
    pub fn is_ready_to_commit(&self) -> bool {
        self.state == EpochState::Committing
    }

    /// Orders the ACS-accepted subset into a block digest ready for
    /// threshold signing (§4.6 steps 5-6), without yet assembling the QC.
    pub fn block_digest(&self, proposer_ids: impl Fn(usize) -> ValidatorId) -> Result<(Block, crate::types::Hash256), EpochError> {
        if self.state != EpochState::Committing {
            return Err(EpochError::WrongState {
                expected: EpochState::Committing,
                actual: self.state,
            });
        }
        let subset = self.acs.result().expect("committing state implies a finalized subset");
        let placeholder_qc = QuorumCertificate {
            message_digest: crate::types::Hash256::zero(),
            aggregate_signature: Vec::new(),
            signer_set: SignerBitmap::new(self.n),
        };
        let block = ordering::build_block(self.epoch, subset, proposer_ids, placeholder_qc)?;
        let digest = block.digest();
        Ok((block, digest))
    }

    /// Aggregates `shares` into the block's QC, persists the finalized
    /// block, and transitions to `DONE`. Enforces §4.6's idempotent write
    /// and the "epoch e+1 never commits before epoch e" ordering rule.
    pub fn finalize(
        &mut self,
        store: &dyn ConductorStore,
        ctx: &ThresholdContext,
        mut block: Block,
        shares: &[SignatureShareBytes],
    ) -> Result<Block, EpochError> {
        if self.state != EpochState::Committing {
            return Err(EpochError::WrongState {
                expected: EpochState::Committing,
                actual: self.state,
            });
        }

        let last_committed = last_committed_epoch(store)?;
        let expected_next = last_committed.map(|e| e + 1).unwrap_or(0);
        if self.epoch > expected_next {
            return Err(EpochError::OutOfOrder {
                epoch: self.epoch,
                last_committed,
            });
        }

        let digest = block.digest();
        let aggregate_signature = ctx.aggregate(shares).map_err(|_| EpochError::InsufficientQuorum {
            required: 2 * self.f + 1,
            provided: shares.len(),
        })?;
        let mut signer_set = SignerBitmap::new(self.n);
        for share in shares {
            signer_set.set(share.index);
        }
        let qc = QuorumCertificate {
            message_digest: digest,
            aggregate_signature,
            signer_set,
        };
        if !qc.has_quorum(self.f) {
            return Err(EpochError::InsufficientQuorum {
                required: 2 * self.f + 1,
                provided: qc.signer_set.popcount(),
            });
        }
        block.quorum_certificate = qc;

        match store.put_block(block.clone()) {
            Ok(()) => {}
            Err(StorageError::Conflict(_)) => return Err(EpochError::AlreadyCommitted(self.epoch)),
            Err(e) => return Err(e.into()),
        }
        store.put_meta(LAST_COMMITTED_EPOCH_KEY, &self.epoch.to_be_bytes())?;
        self.state = EpochState::Done;

        tracing::info!(epoch = self.epoch, local_index = self.local_index, "epoch committed");
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbc::{Fragment, RbcMessage};
    use crate::bba::BbaMessage;
    use crate::types::{EventBatch, EventFingerprint, Hash256, ValidatorId};
    use crate::storage::InMemoryStore;
    use std::collections::VecDeque;

    fn fp(byte: u8) -> EventFingerprint {
        EventFingerprint(Hash256([byte; 32]))
    }

    #[test]
    fn recover_next_epoch_starts_at_zero_with_no_history() {
        let store = InMemoryStore::new();
        assert_eq!(recover_next_epoch(&store).unwrap(), 0);
    }

    #[test]
    fn four_honest_parties_drive_an_epoch_to_done() {
        const N: usize = 4;
        const F: usize = 1;
        const EPOCH: Epoch = 0;

        let contexts = ThresholdContext::deal(N, F);
        let ids: Vec<ValidatorId> = (0..N).map(|i| ValidatorId(Hash256([i as u8 + 1; 32]))).collect();
        let cfg = bincode::config::standard();
        let payloads: Vec<Vec<u8>> = (0..N)
            .map(|i| {
                let batch = EventBatch::new(ids[i], EPOCH, vec![fp(i as u8)], i as u128);
                bincode::serde::encode_to_vec(&batch, cfg).unwrap()
            })
            .collect();

        let mut orchestrators = Vec::with_capacity(N);
        let mut queue: VecDeque<(usize, AcsOutbound)> = VecDeque::new();
        for p in 0..N {
            let (orch, initial) = EpochOrchestrator::start(N, F, p, EPOCH, &payloads[p]).expect("starts");
            orchestrators.push(orch);
            for a in initial {
                queue.push_back((p, a));
            }
        }

        while let Some((origin, action)) = queue.pop_front() {
            match action {
                AcsOutbound::RbcSendTo { proposer, target, message } => {
                    let RbcMessage::Propose(fragment) = message else { unreachable!() };
                    let out = orchestrators[target].handle_rbc_propose(proposer, fragment).unwrap();
                    for a in out {
                        queue.push_back((target, a));
                    }
                }
                AcsOutbound::RbcBroadcast { proposer, message } => {
                    for target in 0..N {
                        let out = match message.clone() {
                            RbcMessage::Echo(fragment) => {
                                orchestrators[target].handle_rbc_echo(proposer, origin, fragment).unwrap()
                            }
                            RbcMessage::Ready { root } => {
                                orchestrators[target].handle_rbc_ready(proposer, origin, root).unwrap()
                            }
                            RbcMessage::Propose(_) => unreachable!(),
                        };
                        for a in out {
                            queue.push_back((target, a));
                        }
                    }
                }
                AcsOutbound::BbaBroadcast { proposer, message } => {
                    for target in 0..N {
                        let out = match message.clone() {
                            BbaMessage::BVal { round, value } => orchestrators[target]
                                .handle_bba_bval(proposer, origin, round, value, &contexts[target])
                                .unwrap(),
                            BbaMessage::Aux { round, value } => orchestrators[target]
                                .handle_bba_aux(proposer, origin, round, value, &contexts[target])
                                .unwrap(),
                            BbaMessage::Coin { round, share } => orchestrators[target]
                                .handle_bba_coin(proposer, origin, round, share, &contexts[target])
                                .unwrap(),
                        };
                        for a in out {
                            queue.push_back((target, a));
                        }
                    }
                }
            }
        }

        for orch in &orchestrators {
            assert!(orch.is_ready_to_commit());
        }

        let store = InMemoryStore::new();
        let (block, digest) = orchestrators[0].block_digest(|i| ids[i]).expect("ordering succeeds");
        let digest_bytes = *digest.as_bytes();
        let shares: Vec<_> = contexts[..3].iter().map(|c| c.sign_share(&digest_bytes).unwrap()).collect();
        let committed = orchestrators[0]
            .finalize(&store, &contexts[0], block, &shares)
            .expect("commits");
        assert_eq!(orchestrators[0].state(), EpochState::Done);
        assert!(committed.quorum_certificate.has_quorum(1));
        assert_eq!(recover_next_epoch(&store).unwrap(), 1);
    }
}
