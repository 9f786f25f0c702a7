use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::node::Node;
use crate::p2p::P2pNetwork;
use crate::transaction::Transaction;

/// Shared application state: the node and the peer network around it.
pub struct AppState {
    pub node: Arc<Node>,
    pub network: Arc<P2pNetwork>,
    pub mining_batch: u64,
}

impl AppState {
    pub fn new(network: Arc<P2pNetwork>, mining_batch: u64) -> Self {
        Self {
            node: network.node().clone(),
            network,
            mining_batch,
        }
    }
}

/* ---------- Chain API Models ---------- */

#[derive(Deserialize)]
pub struct MineRawBlockRequest {
    pub data: Vec<Transaction>,
}

#[derive(Deserialize)]
pub struct TransferRequest {
    pub address: String,
    pub amount: u64,
}

/* ---------- TX API Models ---------- */

#[derive(Deserialize)]
pub struct UnspentQuery {
    pub address: Option<String>,
}

/* ---------- Wallet API Models ---------- */

#[derive(Serialize)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: u64,
}

#[derive(Serialize)]
pub struct AddressResponse {
    pub address: String,
}

/* ---------- Peer API Models ---------- */

#[derive(Deserialize)]
pub struct AddPeerRequest {
    pub peer: String,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub height: usize,
    pub tail_hash: String,
    pub difficulty: u32,
    pub next_difficulty: u32,
    pub cumulative_difficulty: u128,
    pub adjustment_interval: u64,
    pub block_time_target_secs: i64,
    pub last_interval_secs: Option<i64>,
    pub pool_size: usize,
    pub utxo_size: usize,
    pub peers: usize,
}
