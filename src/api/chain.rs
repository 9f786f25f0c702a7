use actix_web::{HttpResponse, Responder, get, post, web};
use log::info;

use super::models::{AppState, MineRawBlockRequest, TransferRequest};
use super::rejection;

/// Get the full blockchain.
#[get("/blocks/")]
pub async fn get_blocks(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.node.get_chain())
}

#[get("/block/{hash}/")]
pub async fn get_block(state: web::Data<AppState>, path: web::Path<(String,)>) -> impl Responder {
    let hash = path.into_inner().0;
    match state.node.get_block_by_hash(&hash) {
        Some(block) => HttpResponse::Ok().json(block),
        None => HttpResponse::NotFound().body(format!("no block with hash {hash}")),
    }
}

/// Mine the given transactions as-is (the caller supplies the grant).
#[post("/mine-raw-block/")]
pub async fn mine_raw_block(
    state: web::Data<AppState>,
    req: web::Json<MineRawBlockRequest>,
) -> impl Responder {
    match state
        .node
        .append_mined_block(req.into_inner().data, state.mining_batch)
        .await
    {
        Ok(block) => HttpResponse::Ok().json(block),
        Err(e) => rejection(e),
    }
}

/// Mine the pool into a new block rewarding the node wallet.
/// Runs cooperatively and fails if a peer's block lands first.
#[post("/mine-block/")]
pub async fn mine_block(state: web::Data<AppState>) -> impl Responder {
    match state.node.mine_next_block_async(state.mining_batch).await {
        Ok(block) => {
            info!("MINER - block {} mined: {}", block.index, block.hash);
            HttpResponse::Ok().json(block)
        }
        Err(e) => rejection(e),
    }
}

/// Mine a block with a single transfer from the node wallet.
#[post("/mine-transaction/")]
pub async fn mine_transaction(
    state: web::Data<AppState>,
    req: web::Json<TransferRequest>,
) -> impl Responder {
    let address = req.address.trim();
    match state
        .node
        .mine_transaction(address, req.amount, state.mining_batch)
        .await
    {
        Ok(block) => HttpResponse::Ok().json(block),
        Err(e) => rejection(e),
    }
}
