//! A minimal proof-of-work blockchain node: UTXO transactions, cumulative
//! difficulty fork choice and WebSocket chain sync between peers.

pub mod api;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod node;
pub mod p2p;
pub mod transaction;
pub mod wallet;

pub use config::Config;
pub use node::{Node, NodeEvent};
