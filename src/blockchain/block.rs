use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{GENESIS_ADDRESS, GENESIS_HASH, GENESIS_TIMESTAMP};
use crate::error::BlockError;
use crate::transaction::Transaction;

/// Proof-of-Work solution: the nonce found and the difficulty it satisfies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub nonce: u64,
    pub difficulty: u32,
}

/// A single block in the chain holding a list of transactions.
///
/// Serialized with the short field names peers exchange on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "ts")]
    pub timestamp: i64, // Unix timestamp in seconds (UTC)
    pub index: u64,
    #[serde(rename = "data")]
    pub transactions: Vec<Transaction>,
    pub hash: String,
    #[serde(rename = "prev")]
    pub previous_hash: String,
    #[serde(rename = "POW")]
    pub proof: Proof,
}

impl Block {
    /// The fixed first block shared by every node. Nothing about it is mined.
    pub fn genesis() -> Self {
        Self {
            timestamp: GENESIS_TIMESTAMP,
            index: 0,
            transactions: vec![Transaction::grant(GENESIS_ADDRESS, 0)],
            hash: GENESIS_HASH.to_string(),
            previous_hash: String::new(),
            proof: Proof::default(),
        }
    }

    /// Recompute the hash from the block's content (everything but `hash`).
    pub fn compute_hash(&self) -> String {
        calculate_hash(
            self.index,
            &self.previous_hash,
            self.timestamp,
            &canonical_transactions(&self.transactions),
            self.proof.difficulty,
            self.proof.nonce,
        )
    }

    /// The cached hash matches the content and meets the declared difficulty.
    /// (Does NOT validate chain linkage.)
    pub fn check_hash(&self) -> Result<(), BlockError> {
        if self.compute_hash() != self.hash {
            return Err(BlockError::HashMismatch {
                index: self.index,
                hash: self.hash.clone(),
            });
        }
        if !hash_matches_difficulty(&self.hash, self.proof.difficulty) {
            return Err(BlockError::Difficulty {
                hash: self.hash.clone(),
                difficulty: self.proof.difficulty,
            });
        }
        Ok(())
    }
}

/// Concatenated canonical text of a transaction list, as committed by the hash.
pub fn canonical_transactions(txs: &[Transaction]) -> String {
    txs.iter().map(Transaction::canonical).collect()
}

/// SHA-256 over `index, previous_hash, timestamp, transactions, difficulty, nonce`,
/// hex encoded.
pub fn calculate_hash(
    index: u64,
    previous_hash: &str,
    timestamp: i64,
    transactions: &str,
    difficulty: u32,
    nonce: u64,
) -> String {
    let preimage = format!("{index}{previous_hash}{timestamp}{transactions}{difficulty}{nonce}");
    hex::encode(Sha256::digest(preimage.as_bytes()))
}

/// Number of leading zero bits of a hex digest, or `None` if it is not hex.
pub fn leading_zero_bits(hash: &str) -> Option<u32> {
    let bytes = hex::decode(hash).ok()?;
    let mut zeros = 0;
    for b in bytes {
        if b == 0 {
            zeros += 8;
        } else {
            zeros += b.leading_zeros();
            break;
        }
    }
    Some(zeros)
}

pub fn hash_matches_difficulty(hash: &str, difficulty: u32) -> bool {
    leading_zero_bits(hash).is_some_and(|z| z >= difficulty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::miner::mine;

    #[test]
    fn genesis_hash_recomputes() {
        let b = Block::genesis();
        assert_eq!(b.hash, b.compute_hash());
        assert_eq!(b.transactions[0].id, crate::blockchain::GENESIS_TX_ID);
        assert!(b.check_hash().is_ok());
    }

    #[test]
    fn genesis_is_identical_across_instances() {
        assert_eq!(Block::genesis(), Block::genesis());
        assert_eq!(
            serde_json::to_string(&Block::genesis()).unwrap(),
            serde_json::to_string(&Block::genesis()).unwrap()
        );
    }

    #[test]
    fn leading_zero_bit_counting() {
        assert_eq!(leading_zero_bits("00ff"), Some(8));
        assert_eq!(leading_zero_bits("0f00"), Some(4));
        assert_eq!(leading_zero_bits("1000"), Some(3));
        assert_eq!(leading_zero_bits("8000"), Some(0));
        assert_eq!(leading_zero_bits("0000"), Some(16));
        assert_eq!(leading_zero_bits("xyz"), None);
        assert!(hash_matches_difficulty("0fff", 4));
        assert!(!hash_matches_difficulty("0fff", 5));
    }

    #[test]
    fn mining_produces_leading_zeros() {
        let b = mine(1, GENESIS_HASH, 1_700_000_000, vec![], 8);
        assert!(b.hash.starts_with("00"));
        assert!(b.check_hash().is_ok());
    }

    #[test]
    fn invalid_when_mutated() {
        let mut b = mine(1, GENESIS_HASH, 1_700_000_000, vec![], 4);
        b.timestamp += 1;
        assert!(matches!(b.check_hash(), Err(BlockError::HashMismatch { .. })));
    }

    #[test]
    fn overstated_difficulty_is_rejected() {
        let mut b = mine(1, GENESIS_HASH, 1_700_000_000, vec![], 0);
        b.proof.difficulty = 200;
        b.hash = b.compute_hash();
        assert!(matches!(b.check_hash(), Err(BlockError::Difficulty { .. })));
    }

    #[test]
    fn json_uses_wire_field_names() {
        let json = serde_json::to_value(Block::genesis()).unwrap();
        for key in ["ts", "index", "data", "hash", "prev", "POW"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["POW"]["difficulty"], 0);
    }
}
