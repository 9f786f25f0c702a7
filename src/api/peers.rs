use actix_web::{HttpResponse, Responder, get, post, web};
use log::info;

use super::models::{AddPeerRequest, AppState};

#[get("/peers/")]
pub async fn get_peers(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(state.network.list_peers())
}

/// Dial a new peer. The connection is made in the background.
#[post("/peers/")]
pub async fn add_peer(state: web::Data<AppState>, body: web::Json<AddPeerRequest>) -> impl Responder {
    let url = body.peer.trim();
    if !url.starts_with("ws://") && !url.starts_with("wss://") {
        return HttpResponse::BadRequest().body("peer must be a ws:// or wss:// url");
    }
    info!("POST /peers/ - dialing {url}");
    let id = state.network.connect_peer(url);
    HttpResponse::Ok().json(serde_json::json!({ "id": id, "peer": url }))
}
