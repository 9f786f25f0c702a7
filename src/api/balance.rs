use actix_web::{HttpResponse, Responder, get, web};

use super::models::{AppState, BalanceResponse};

#[get("/balance/{address}/")]
pub async fn get_balance(state: web::Data<AppState>, path: web::Path<(String,)>) -> impl Responder {
    let address = path.into_inner().0;
    let balance = state.node.get_balance(&address);
    HttpResponse::Ok().json(BalanceResponse { address, balance })
}

/// Balance of the node wallet.
#[get("/balance/")]
pub async fn get_my_balance(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(BalanceResponse {
        address: state.node.wallet_address().to_string(),
        balance: state.node.my_balance(),
    })
}
