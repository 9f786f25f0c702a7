use actix_web::{HttpResponse, Responder, get, web};

use super::models::{AppState, StatsResponse};
use crate::blockchain::{ADJUSTMENT_INTERVAL, BLOCK_TIME_TARGET_SECS, cumulative_difficulty};

#[get("/stats/")]
pub async fn get_stats(state: web::Data<AppState>) -> impl Responder {
    // One snapshot so every figure describes the same chain.
    let snapshot = state.node.snapshot();
    let blocks = snapshot.ledger().blocks();
    let tail = snapshot.tail();

    let last_interval_secs = match blocks {
        [.., older, newer] => Some((newer.timestamp - older.timestamp).max(0)),
        _ => None,
    };

    HttpResponse::Ok().json(StatsResponse {
        height: blocks.len(),
        tail_hash: tail.hash.clone(),
        difficulty: tail.proof.difficulty,
        next_difficulty: snapshot.ledger().next_difficulty(),
        cumulative_difficulty: cumulative_difficulty(blocks),
        adjustment_interval: ADJUSTMENT_INTERVAL,
        block_time_target_secs: BLOCK_TIME_TARGET_SECS,
        last_interval_secs,
        pool_size: snapshot.pool().len(),
        utxo_size: snapshot.utxo().len(),
        peers: state.network.list_peers().len(),
    })
}
