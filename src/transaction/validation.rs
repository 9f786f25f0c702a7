//! Economic validity of transactions against a UTXO set.

use log::warn;
use std::collections::HashSet;

use super::model::{COINBASE_AMOUNT, Transaction};
use super::utxo::{OutPoint, UtxoSet};
use crate::error::TxError;
use crate::wallet::verify_signature_hex;

/// Validate a regular (non-grant) transaction:
/// id recomputes, every input is unspent and signed by the owner of the
/// referenced output, and inputs exactly balance outputs.
pub fn validate_transaction(tx: &Transaction, utxo: &UtxoSet) -> Result<(), TxError> {
    if !tx.has_valid_id() {
        return Err(TxError::InvalidId(tx.id.clone()));
    }
    if tx.inputs.is_empty() {
        return Err(TxError::Shape(format!("tx {} has no inputs", tx.id)));
    }

    let mut seen = HashSet::new();
    let mut input_sum: u128 = 0;
    for (i, input) in tx.inputs.iter().enumerate() {
        let outpoint = input.outpoint();
        if !seen.insert(outpoint.clone()) {
            return Err(TxError::DuplicateInput {
                id: outpoint.id,
                index: outpoint.index,
            });
        }

        let referenced = utxo.get(&outpoint).ok_or_else(|| TxError::MissingOutput {
            id: outpoint.id.clone(),
            index: outpoint.index,
        })?;

        let signed = verify_signature_hex(&referenced.address, &input.signature, &tx.id)
            .unwrap_or(false);
        if !signed {
            return Err(TxError::BadSignature {
                tx: tx.id.clone(),
                input: i,
            });
        }
        input_sum += referenced.amount as u128;
    }

    let output_sum = tx.total_output_amount();
    if input_sum != output_sum {
        return Err(TxError::AmountMismatch {
            inputs: input_sum,
            outputs: output_sum,
        });
    }
    Ok(())
}

/// The grant transaction must be present, carry a valid id, reference the
/// block index through its single input and pay exactly the reward.
pub fn validate_grant_transaction(
    tx: Option<&Transaction>,
    block_index: u64,
) -> Result<(), TxError> {
    let tx = tx.ok_or(TxError::Grant(
        "the first tx in the block must be a grant-tx",
    ))?;
    if !tx.has_valid_id() {
        return Err(TxError::InvalidId(tx.id.clone()));
    }
    if tx.inputs.len() != 1 {
        return Err(TxError::Grant("one txIn must be specified in the grant-tx"));
    }
    if u64::from(tx.inputs[0].referenced_output_index) != block_index {
        return Err(TxError::Grant("invalid txIn index in grant-tx"));
    }
    if tx.outputs.len() != 1 {
        return Err(TxError::Grant("invalid number of txOuts in grant-tx"));
    }
    if tx.outputs[0].amount != COINBASE_AMOUNT {
        return Err(TxError::Grant("invalid amount in grant-tx"));
    }
    Ok(())
}

/// Validate a block's whole batch: grant first, no outpoint referenced twice
/// anywhere in the batch (grant input included), every other tx valid.
pub fn validate_block_transactions(
    txs: &[Transaction],
    block_index: u64,
    utxo: &UtxoSet,
) -> Result<(), TxError> {
    validate_grant_transaction(txs.first(), block_index)?;

    let mut seen: HashSet<OutPoint> = HashSet::new();
    for outpoint in txs.iter().flat_map(Transaction::outpoints) {
        if !seen.insert(outpoint.clone()) {
            return Err(TxError::DuplicateInput {
                id: outpoint.id,
                index: outpoint.index,
            });
        }
    }

    for tx in txs.iter().skip(1) {
        validate_transaction(tx, utxo)?;
    }
    Ok(())
}

/// Shape-check, validate and apply a block's transactions.
/// Returns the new set; `utxo` is never modified.
pub fn process_block_transactions(
    txs: &[Transaction],
    block_index: u64,
    utxo: &UtxoSet,
) -> Result<UtxoSet, TxError> {
    for tx in txs {
        tx.validate_shape()?;
    }
    validate_block_transactions(txs, block_index, utxo)?;
    Ok(utxo.apply(txs))
}

/// Transaction rules the ledger consults when appending or replaying blocks.
pub trait TransactionValidator: Send + Sync {
    fn process_block(
        &self,
        txs: &[Transaction],
        block_index: u64,
        utxo: &UtxoSet,
    ) -> Result<UtxoSet, TxError>;
}

/// The UTXO rules above.
#[derive(Debug, Default, Clone, Copy)]
pub struct UtxoValidator;

impl TransactionValidator for UtxoValidator {
    fn process_block(
        &self,
        txs: &[Transaction],
        block_index: u64,
        utxo: &UtxoSet,
    ) -> Result<UtxoSet, TxError> {
        process_block_transactions(txs, block_index, utxo).inspect_err(|e| {
            warn!("rejected transactions of block {block_index}: {e}");
        })
    }
}
