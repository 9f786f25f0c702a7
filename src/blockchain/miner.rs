use super::block::{Block, Proof, calculate_hash, canonical_transactions, hash_matches_difficulty};
use crate::transaction::Transaction;

/// A resumable nonce search for one block.
///
/// `step` tries a single nonce, `run_steps` a bounded batch and `run` keeps
/// going until a block is found. All three share the same state, so a caller
/// can interleave batches with other work and simply drop the task to cancel.
#[derive(Debug, Clone)]
pub struct MiningTask {
    index: u64,
    previous_hash: String,
    timestamp: i64,
    transactions: Vec<Transaction>,
    canonical: String,
    difficulty: u32,
    next_nonce: u64,
}

impl MiningTask {
    pub fn new(
        index: u64,
        previous_hash: impl Into<String>,
        timestamp: i64,
        transactions: Vec<Transaction>,
        difficulty: u32,
    ) -> Self {
        let canonical = canonical_transactions(&transactions);
        Self {
            index,
            previous_hash: previous_hash.into(),
            timestamp,
            transactions,
            canonical,
            difficulty,
            next_nonce: 0,
        }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Nonces tried so far.
    pub fn attempts(&self) -> u64 {
        self.next_nonce
    }

    /// Try the next nonce.
    pub fn step(&mut self) -> Option<Block> {
        let nonce = self.next_nonce;
        self.next_nonce = self.next_nonce.wrapping_add(1);

        let hash = calculate_hash(
            self.index,
            &self.previous_hash,
            self.timestamp,
            &self.canonical,
            self.difficulty,
            nonce,
        );
        if !hash_matches_difficulty(&hash, self.difficulty) {
            return None;
        }
        Some(Block {
            timestamp: self.timestamp,
            index: self.index,
            transactions: self.transactions.clone(),
            hash,
            previous_hash: self.previous_hash.clone(),
            proof: Proof {
                nonce,
                difficulty: self.difficulty,
            },
        })
    }

    /// Try up to `steps` nonces.
    pub fn run_steps(&mut self, steps: u64) -> Option<Block> {
        (0..steps).find_map(|_| self.step())
    }

    /// Search until a block is found.
    pub fn run(mut self) -> Block {
        loop {
            if let Some(block) = self.step() {
                return block;
            }
        }
    }
}

/// Mine a block to completion.
pub fn mine(
    index: u64,
    previous_hash: &str,
    timestamp: i64,
    transactions: Vec<Transaction>,
    difficulty: u32,
) -> Block {
    MiningTask::new(index, previous_hash, timestamp, transactions, difficulty).run()
}
