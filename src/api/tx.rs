use actix_web::{HttpResponse, Responder, get, post, web};
use log::debug;

use super::models::{AppState, TransferRequest, UnspentQuery};
use super::rejection;
use crate::transaction::Transaction;

/// Unspent outputs, optionally filtered with `?address=`.
#[get("/unspent/")]
pub async fn get_unspent(
    state: web::Data<AppState>,
    query: web::Query<UnspentQuery>,
) -> impl Responder {
    HttpResponse::Ok().json(state.node.get_unspent(query.address.as_deref()))
}

#[get("/my-unspent/")]
pub async fn get_my_unspent(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.node.my_unspent())
}

/// Build, sign and pool a transfer from the node wallet.
#[post("/send-transaction/")]
pub async fn send_transaction(
    state: web::Data<AppState>,
    body: web::Json<TransferRequest>,
) -> impl Responder {
    debug!(
        "POST /send-transaction/ - {} to {}",
        body.amount, body.address
    );
    match state.node.send_transaction(body.address.trim(), body.amount) {
        Ok(tx) => HttpResponse::Ok().json(tx),
        Err(e) => rejection(e),
    }
}

/// Submit an already signed transaction into the pool.
#[post("/transaction/")]
pub async fn post_transaction(
    state: web::Data<AppState>,
    body: web::Json<Transaction>,
) -> impl Responder {
    debug!(
        "POST /transaction/ - received: inputs={}, outputs={}",
        body.inputs.len(),
        body.outputs.len()
    );
    match state.node.submit_transaction(body.into_inner()) {
        Ok(tx) => HttpResponse::Ok().json(tx),
        Err(e) => rejection(e),
    }
}

#[get("/transaction-pool/")]
pub async fn get_transaction_pool(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.node.get_tx_pool())
}
