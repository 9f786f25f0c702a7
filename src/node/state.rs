use crate::blockchain::{Block, Ledger};
use crate::error::{BlockError, ChainError, TxError};
use crate::transaction::{Transaction, TxPool, UtxoSet};

/// Everything consensus mutates: the chain, the spendable outputs it
/// produces and the pool of unconfirmed transactions.
///
/// The three only change together, through the methods below, so the UTXO
/// set always matches the ledger and the pool always applies to the set.
#[derive(Debug, Clone)]
pub struct NodeState {
    ledger: Ledger,
    utxo: UtxoSet,
    pool: TxPool,
}

impl Default for NodeState {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeState {
    pub fn new() -> Self {
        let ledger = Ledger::new();
        let utxo = ledger.genesis_utxo();
        Self {
            ledger,
            utxo,
            pool: TxPool::new(),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn utxo(&self) -> &UtxoSet {
        &self.utxo
    }

    pub fn pool(&self) -> &TxPool {
        &self.pool
    }

    pub fn tail(&self) -> &Block {
        self.ledger.tail()
    }

    /// Append a single block and prune the pool against the new set.
    pub fn append_block(&mut self, block: Block) -> Result<(), BlockError> {
        self.utxo = self.ledger.append(block, &self.utxo)?;
        self.pool.prune(&self.utxo);
        Ok(())
    }

    /// Adopt a competing chain; the UTXO set is the candidate's replay.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> Result<(), ChainError> {
        self.utxo = self.ledger.replace(candidate)?;
        self.pool.prune(&self.utxo);
        Ok(())
    }

    pub fn add_to_pool(&mut self, tx: Transaction) -> Result<(), TxError> {
        self.pool.add(tx, &self.utxo)
    }
}
