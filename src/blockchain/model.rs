use chrono::Utc;

use super::fork::select_chain;
use super::{Block, TIMESTAMP_TOLERANCE_SECS, next_difficulty};
use crate::error::{BlockError, ChainError};
use crate::transaction::{TransactionValidator, UtxoSet, UtxoValidator};

/// Check `block` as the successor of `previous`: index continuity, linkage,
/// timestamp window, hash content and proof of work, in that order.
pub fn validate_new_block(block: &Block, previous: &Block, now: i64) -> Result<(), BlockError> {
    if block.index != previous.index + 1 {
        return Err(BlockError::Index {
            expected: previous.index + 1,
            got: block.index,
        });
    }
    if block.previous_hash != previous.hash {
        return Err(BlockError::PreviousHash(block.index));
    }
    // Peer timestamps are arbitrary i64s, so the window must not overflow.
    let after_previous =
        previous.timestamp.saturating_sub(TIMESTAMP_TOLERANCE_SECS) < block.timestamp;
    let not_in_future = block.timestamp < now.saturating_add(TIMESTAMP_TOLERANCE_SECS);
    if !after_previous || !not_in_future {
        return Err(BlockError::Timestamp {
            index: block.index,
            timestamp: block.timestamp,
        });
    }
    block.check_hash()
}

pub fn is_valid_new_block(block: &Block, previous: &Block) -> bool {
    validate_new_block(block, previous, Utc::now().timestamp()).is_ok()
}

/// Structural validity of a whole chain: exact genesis, then every block a
/// valid successor of the one before it. Transactions are not looked at.
pub fn validate_chain(chain: &[Block], now: i64) -> Result<(), BlockError> {
    let genesis = chain.first().ok_or(BlockError::EmptyChain)?;
    if *genesis != Block::genesis() {
        return Err(BlockError::Genesis);
    }
    for pair in chain.windows(2) {
        validate_new_block(&pair[1], &pair[0], now)?;
    }
    Ok(())
}

pub fn is_valid_chain(chain: &[Block]) -> bool {
    validate_chain(chain, Utc::now().timestamp()).is_ok()
}

/// Validate `chain` and replay every block's transactions from an empty set.
/// Returns the UTXO set the chain produces.
pub fn replay_chain<V: TransactionValidator>(
    chain: &[Block],
    validator: &V,
    now: i64,
) -> Result<UtxoSet, BlockError> {
    validate_chain(chain, now)?;
    chain.iter().try_fold(UtxoSet::new(), |utxo, block| {
        validator
            .process_block(&block.transactions, block.index, &utxo)
            .map_err(|source| BlockError::Transactions {
                index: block.index,
                source,
            })
    })
}

/// The ordered block sequence, parameterized by the transaction rules used
/// when blocks are appended or a competing chain is replayed.
#[derive(Debug, Clone)]
pub struct Ledger<V: TransactionValidator = UtxoValidator> {
    blocks: Vec<Block>,
    validator: V,
}

impl Ledger<UtxoValidator> {
    /// A ledger holding only the genesis block.
    pub fn new() -> Self {
        Self::with_validator(UtxoValidator)
    }
}

impl Default for Ledger<UtxoValidator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: TransactionValidator> Ledger<V> {
    pub fn with_validator(validator: V) -> Self {
        Self {
            blocks: vec![Block::genesis()],
            validator,
        }
    }

    /// The UTXO set of the genesis block alone.
    pub fn genesis_utxo(&self) -> UtxoSet {
        UtxoSet::new().apply(&self.blocks[0].transactions)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn validator(&self) -> &V {
        &self.validator
    }

    /// Return the last block in the chain.
    pub fn tail(&self) -> &Block {
        self.blocks
            .last()
            .expect("Ledger should always have at least the genesis block")
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block_by_hash(&self, hash: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.hash == hash)
    }

    /// Difficulty the next locally mined block must carry.
    pub fn next_difficulty(&self) -> u32 {
        next_difficulty(&self.blocks)
    }

    /// Append `block` on top of the tail if it is a valid successor and its
    /// transactions apply to `utxo`. Returns the resulting set; on error
    /// nothing changes.
    pub fn append(&mut self, block: Block, utxo: &UtxoSet) -> Result<UtxoSet, BlockError> {
        validate_new_block(&block, self.tail(), Utc::now().timestamp())?;
        let next = self
            .validator
            .process_block(&block.transactions, block.index, utxo)
            .map_err(|source| BlockError::Transactions {
                index: block.index,
                source,
            })?;
        self.blocks.push(block);
        Ok(next)
    }

    /// Swap in `candidate` if it is valid, replays cleanly and carries at
    /// least as much work as the current chain. Returns the replayed set.
    pub fn replace(&mut self, candidate: Vec<Block>) -> Result<UtxoSet, ChainError> {
        let utxo = select_chain(&self.blocks, &candidate, &self.validator)?;
        self.blocks = candidate;
        Ok(utxo)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serialize_chain(&self.blocks)
    }
}

pub fn serialize_chain(chain: &[Block]) -> serde_json::Result<String> {
    serde_json::to_string(chain)
}

pub fn deserialize_chain(json: &str) -> serde_json::Result<Vec<Block>> {
    serde_json::from_str(json)
}
