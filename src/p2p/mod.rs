pub mod message;
pub mod protocol;
pub mod server;

pub use message::{Message, MessageType, WireMessage};
pub use protocol::{Outbound, handle_message};
pub use server::{ConnectionState, P2pNetwork, PeerInfo};
