mod balance;
mod chain;
mod health;
pub mod models;
mod peers;
mod stats;
mod tx;
mod wallet;

use actix_web::HttpResponse;
use actix_web::web::{self, ServiceConfig};
use log::warn;
use std::fmt::Display;

pub use models::AppState;

pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(health::health_check)
            .service(chain::get_blocks)
            .service(chain::get_block)
            .service(chain::mine_raw_block)
            .service(chain::mine_block)
            .service(chain::mine_transaction)
            .service(tx::get_unspent)
            .service(tx::get_my_unspent)
            .service(tx::send_transaction)
            .service(tx::post_transaction)
            .service(tx::get_transaction_pool)
            .service(balance::get_balance)
            .service(balance::get_my_balance)
            .service(wallet::get_address)
            .service(peers::get_peers)
            .service(peers::add_peer)
            .service(stats::get_stats),
    );
}

/// Failed operations answer 400 with the rejection reason.
fn rejection(reason: impl Display) -> HttpResponse {
    warn!("request rejected: {reason}");
    HttpResponse::BadRequest().body(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Block;
    use crate::node::Node;
    use crate::p2p::P2pNetwork;
    use crate::transaction::{Transaction, UnspentOutput};
    use crate::wallet::Wallet;
    use actix_web::{App, test};
    use std::sync::Arc;

    fn state() -> web::Data<AppState> {
        let network = P2pNetwork::new(Arc::new(Node::new(Wallet::generate())));
        web::Data::new(AppState::new(network, 100))
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(App::new().app_data($state.clone()).configure(init_routes)).await
        };
    }

    #[actix_web::test]
    async fn health_and_genesis() {
        let state = state();
        let app = app!(state);

        let req = test::TestRequest::get().uri("/api/v1/health/").to_request();
        assert!(test::call_service(&app, req).await.status().is_success());

        let req = test::TestRequest::get().uri("/api/v1/blocks/").to_request();
        let blocks: Vec<Block> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(blocks, vec![Block::genesis()]);
    }

    #[actix_web::test]
    async fn mine_and_query_balance() {
        let state = state();
        let app = app!(state);

        let req = test::TestRequest::post().uri("/api/v1/mine-block/").to_request();
        let block: Block = test::call_and_read_body_json(&app, req).await;
        assert_eq!(block.index, 1);

        let uri = format!("/api/v1/block/{}/", block.hash);
        let req = test::TestRequest::get().uri(&uri).to_request();
        let fetched: Block = test::call_and_read_body_json(&app, req).await;
        assert_eq!(fetched, block);

        let req = test::TestRequest::get().uri("/api/v1/balance/").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["balance"], 50);
        assert_eq!(body["address"], state.node.wallet_address());

        let req = test::TestRequest::get().uri("/api/v1/my-unspent/").to_request();
        let unspent: Vec<UnspentOutput> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(unspent.len(), 1);
    }

    #[actix_web::test]
    async fn send_then_mine() {
        let state = state();
        let app = app!(state);
        let receiver = Wallet::generate();
        state.node.mine_next_block().unwrap();

        let req = test::TestRequest::post()
            .uri("/api/v1/send-transaction/")
            .set_json(serde_json::json!({ "address": receiver.address(), "amount": 20 }))
            .to_request();
        let tx: Transaction = test::call_and_read_body_json(&app, req).await;

        let req = test::TestRequest::get().uri("/api/v1/transaction-pool/").to_request();
        let pool: Vec<Transaction> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(pool, vec![tx]);

        let req = test::TestRequest::post().uri("/api/v1/mine-block/").to_request();
        assert!(test::call_service(&app, req).await.status().is_success());

        let uri = format!("/api/v1/balance/{}/", receiver.address());
        let req = test::TestRequest::get().uri(&uri).to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["balance"], 20);
    }

    #[actix_web::test]
    async fn rejections_are_bad_requests() {
        let state = state();
        let app = app!(state);

        // No funds yet.
        let req = test::TestRequest::post()
            .uri("/api/v1/send-transaction/")
            .set_json(serde_json::json!({ "address": Wallet::generate().address(), "amount": 1 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body = test::read_body(resp).await;
        assert!(String::from_utf8_lossy(&body).contains("insufficient funds"));

        // A raw block without a grant.
        let req = test::TestRequest::post()
            .uri("/api/v1/mine-raw-block/")
            .set_json(serde_json::json!({ "data": [] }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);

        let req = test::TestRequest::get().uri("/api/v1/block/beef/").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 404);

        let req = test::TestRequest::post()
            .uri("/api/v1/peers/")
            .set_json(serde_json::json!({ "peer": "http://nope" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);
    }

    #[actix_web::test]
    async fn stats_and_address() {
        let state = state();
        let app = app!(state);

        let req = test::TestRequest::get().uri("/api/v1/stats/").to_request();
        let stats: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(stats["height"], 1);
        assert_eq!(stats["pool_size"], 0);
        assert_eq!(stats["peers"], 0);

        let req = test::TestRequest::get().uri("/api/v1/address/").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["address"], state.node.wallet_address());

        let req = test::TestRequest::get().uri("/api/v1/peers/").to_request();
        let peers: Vec<serde_json::Value> = test::call_and_read_body_json(&app, req).await;
        assert!(peers.is_empty());
    }
}
