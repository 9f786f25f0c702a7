use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::{error, info, warn};
use std::sync::Arc;

use rust_pow_node::api::{self, AppState};
use rust_pow_node::p2p::P2pNetwork;
use rust_pow_node::wallet::Wallet;
use rust_pow_node::{Config, Node};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let config = Config::from_env();

    let wallet = match config.wallet_private_key.as_deref().map(Wallet::from_private_key) {
        Some(Ok(wallet)) => wallet,
        Some(Err(e)) => {
            warn!("WALLET_PRIVATE_KEY ignored ({e}), generating a new key");
            Wallet::generate()
        }
        None => Wallet::generate(),
    };

    let node = Arc::new(Node::new(wallet));
    let network = P2pNetwork::new(node);
    network.spawn_event_relay();

    let listener = P2pNetwork::bind(&config.p2p_addr()).await?;
    tokio::spawn(network.clone().serve(listener));
    for peer in &config.peers {
        network.connect_peer(peer.clone());
    }

    let (host, port) = (config.host.clone(), config.port);
    println!("⛓️ Starting node API at http://{host}:{port}");
    info!("mining batch {} nonces", config.mining_batch);

    let state = web::Data::new(AppState::new(network, config.mining_batch));

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::init_routes)
    })
    .bind((host.as_str(), port))
    .inspect_err(|e| error!("cannot bind http on {host}:{port}: {e}"))?
    .run()
    .await
}
