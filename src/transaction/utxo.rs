use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::model::{Transaction, TxOutput};

/// Identifies a specific transaction output by its transaction id and index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub id: String,
    pub index: u32,
}

impl OutPoint {
    pub fn new(id: impl Into<String>, index: u32) -> Self {
        Self {
            id: id.into(),
            index,
        }
    }
}

/// One currently spendable output, as exposed to wallets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
    #[serde(rename = "txOutId")]
    pub output_id: String,
    #[serde(rename = "txOutIndex")]
    pub output_index: u32,
    pub address: String,
    pub amount: u64,
}

/// The set of spendable outputs keyed by (id, index).
///
/// Ordered so that listings and wallet coin selection are deterministic.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UtxoSet {
    map: BTreeMap<OutPoint, TxOutput>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, outpoint: OutPoint, output: TxOutput) {
        self.map.insert(outpoint, output);
    }

    /// Spend (remove) a single outpoint. Returns the removed output if it existed.
    pub fn spend(&mut self, outpoint: &OutPoint) -> Option<TxOutput> {
        self.map.remove(outpoint)
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&TxOutput> {
        self.map.get(outpoint)
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.map.contains_key(outpoint)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OutPoint, &TxOutput)> {
        self.map.iter()
    }

    /// Add every output of `tx`; the output index is its position in the tx.
    pub fn add_tx_outputs(&mut self, tx: &Transaction) {
        for (i, out) in tx.outputs.iter().enumerate() {
            self.insert(OutPoint::new(tx.id.clone(), i as u32), out.clone());
        }
    }

    /// Spend every input and add every output of `txs`, returning the
    /// resulting set. `self` is left untouched; callers validate first.
    pub fn apply(&self, txs: &[Transaction]) -> UtxoSet {
        let mut next = self.clone();
        for tx in txs {
            for outpoint in tx.outpoints() {
                next.spend(&outpoint);
            }
        }
        for tx in txs {
            next.add_tx_outputs(tx);
        }
        next
    }

    /// Records owned by `address`, or all records when `address` is `None`.
    pub fn unspent(&self, address: Option<&str>) -> Vec<UnspentOutput> {
        self.map
            .iter()
            .filter(|(_, out)| address.is_none_or(|a| out.address == a))
            .map(|(op, out)| UnspentOutput {
                output_id: op.id.clone(),
                output_index: op.index,
                address: out.address.clone(),
                amount: out.amount,
            })
            .collect()
    }

    pub fn balance(&self, address: &str) -> u64 {
        self.map
            .values()
            .filter(|out| out.address == address)
            .map(|out| out.amount)
            .fold(0u64, u64::saturating_add)
    }
}
