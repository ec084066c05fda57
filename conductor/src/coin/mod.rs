//! Common coin (§4.4, GLOSSARY): a scheme producing a bit unpredictable
//! to any `f` adversaries and identical for all honest parties, used to
//! break symmetry in binary Byzantine agreement.
//!
//! Built directly on [`crate::crypto::threshold::ThresholdContext`]: the
//! "coin value" for round `r` of epoch `e`'s BBA instance `inst` is the
//! low bit of the BLAKE3 digest of the threshold-aggregated signature
//! over a deterministic message naming `(e, inst, r)`. No party can bias
//! it alone because no `f`-sized set can produce a valid aggregate; every
//! honest party that sees `2f+1` shares recovers the identical signature
//! and therefore the identical bit.

use crate::crypto::threshold::{SignatureShareBytes, ThresholdContext, ThresholdError};
use crate::types::{Epoch, Hash256};

/// Deterministic per-round coin message: `"coin" || epoch || instance || round`.
fn coin_message(epoch: Epoch, instance: usize, round: u32) -> Vec<u8> {
    let mut msg = Vec::with_capacity(4 + 8 + 8 + 4);
    msg.extend_from_slice(b"coin");
    msg.extend_from_slice(&epoch.to_be_bytes());
    msg.extend_from_slice(&(instance as u64).to_be_bytes());
    msg.extend_from_slice(&round.to_be_bytes());
    msg
}

/// Produces this validator's share of the coin for `(epoch, instance, round)`.
pub fn sign_coin_share(
    ctx: &ThresholdContext,
    epoch: Epoch,
    instance: usize,
    round: u32,
) -> Result<SignatureShareBytes, ThresholdError> {
    ctx.sign_share(&coin_message(epoch, instance, round))
}

/// Combines `>= threshold` coin shares into the round's coin bit. Any
/// honest party combining the same (or a different, equally-sized)
/// qualifying share set recovers the identical bit, since BLS aggregate
/// signatures are unique per message under the group public key.
pub fn combine_coin(
    ctx: &ThresholdContext,
    epoch: Epoch,
    instance: usize,
    round: u32,
    shares: &[SignatureShareBytes],
) -> Result<bool, ThresholdError> {
    let aggregate = ctx.aggregate(shares)?;
    let digest = Hash256::compute(&aggregate);
    Ok(digest.as_bytes()[0] & 1 == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coin_is_identical_for_any_qualifying_share_subset() {
        let contexts = ThresholdContext::deal(4, 1);
        let epoch = 9;
        let instance = 2;
        let round = 0;

        let shares_a: Vec<_> = contexts[..3]
            .iter()
            .map(|c| sign_coin_share(c, epoch, instance, round).unwrap())
            .collect();
        let shares_b: Vec<_> = contexts[1..]
            .iter()
            .map(|c| sign_coin_share(c, epoch, instance, round).unwrap())
            .collect();

        let bit_a = combine_coin(&contexts[0], epoch, instance, round, &shares_a).unwrap();
        let bit_b = combine_coin(&contexts[0], epoch, instance, round, &shares_b).unwrap();
        assert_eq!(bit_a, bit_b);
    }

    #[test]
    fn different_rounds_can_diverge() {
        let contexts = ThresholdContext::deal(4, 1);
        let epoch = 1;
        let instance = 0;

        let bits: Vec<bool> = (0..8u32)
            .map(|round| {
                let shares: Vec<_> = contexts[..3]
                    .iter()
                    .map(|c| sign_coin_share(c, epoch, instance, round).unwrap())
                    .collect();
                combine_coin(&contexts[0], epoch, instance, round, &shares).unwrap()
            })
            .collect();
        assert!(bits.iter().any(|b| *b) && bits.iter().any(|b| !*b));
    }
}
