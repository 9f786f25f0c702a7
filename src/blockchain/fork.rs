use chrono::Utc;
use log::debug;

use super::Block;
use super::model::replay_chain;
use crate::error::ChainError;
use crate::transaction::{TransactionValidator, UtxoSet};

/// Accumulated proof of work: the sum of `2^difficulty` over all blocks.
pub fn cumulative_difficulty(chain: &[Block]) -> u128 {
    chain
        .iter()
        .map(|b| 1u128.checked_shl(b.proof.difficulty).unwrap_or(u128::MAX))
        .fold(0, u128::saturating_add)
}

/// Decide whether `candidate` should replace `current`.
///
/// The candidate must carry at least as much work, pass structural
/// validation and replay every block's transactions from genesis. On
/// success the UTXO set it produces is returned, rebuilt from scratch.
pub fn select_chain<V: TransactionValidator>(
    current: &[Block],
    candidate: &[Block],
    validator: &V,
) -> Result<UtxoSet, ChainError> {
    let current_work = cumulative_difficulty(current);
    let candidate_work = cumulative_difficulty(candidate);
    if candidate_work < current_work {
        return Err(ChainError::InsufficientWork {
            candidate: candidate_work,
            current: current_work,
        });
    }
    let utxo = replay_chain(candidate, validator, Utc::now().timestamp())?;
    debug!(
        "candidate chain of {} blocks accepted: work {candidate_work} >= {current_work}",
        candidate.len()
    );
    Ok(utxo)
}
