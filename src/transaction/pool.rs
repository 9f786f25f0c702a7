use log::debug;
use std::collections::HashSet;

use super::model::Transaction;
use super::utxo::{OutPoint, UtxoSet};
use super::validation::validate_transaction;
use crate::error::TxError;

/// Transactions waiting to be mined.
///
/// No two pooled transactions reference the same outpoint.
#[derive(Debug, Default, Clone)]
pub struct TxPool {
    txs: Vec<Transaction>,
}

impl TxPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `tx` if it is valid against `utxo` and does not spend an
    /// outpoint that a pooled transaction already spends.
    pub fn add(&mut self, tx: Transaction, utxo: &UtxoSet) -> Result<(), TxError> {
        tx.validate_shape()?;
        validate_transaction(&tx, utxo)?;
        if self.txs.iter().any(|t| t.id == tx.id) {
            return Err(TxError::AlreadyPooled(tx.id));
        }
        let pooled = self.spent_outpoints();
        if let Some(conflict) = tx.outpoints().find(|op| pooled.contains(op)) {
            return Err(TxError::PoolConflict {
                id: conflict.id,
                index: conflict.index,
            });
        }
        debug!("tx {} added to pool (size {})", tx.id, self.txs.len() + 1);
        self.txs.push(tx);
        Ok(())
    }

    /// Drop every transaction that spends an outpoint missing from `utxo`.
    /// Returns how many were removed.
    pub fn prune(&mut self, utxo: &UtxoSet) -> usize {
        let before = self.txs.len();
        self.txs
            .retain(|tx| tx.outpoints().all(|op| utxo.contains(&op)));
        let removed = before - self.txs.len();
        if removed > 0 {
            debug!("pruned {removed} txs from pool (size {})", self.txs.len());
        }
        removed
    }

    pub fn spent_outpoints(&self) -> HashSet<OutPoint> {
        self.txs.iter().flat_map(Transaction::outpoints).collect()
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.txs
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }
}
