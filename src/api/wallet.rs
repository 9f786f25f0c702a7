use actix_web::{HttpResponse, Responder, get, web};

use super::models::{AddressResponse, AppState};

#[get("/address/")]
pub async fn get_address(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(AddressResponse {
        address: state.node.wallet_address().to_string(),
    })
}
