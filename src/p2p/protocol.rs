//! What a node does with each peer message. Transport-free so it can be
//! driven directly in tests.

use log::{debug, info};

use super::message::Message;
use crate::blockchain::Block;
use crate::node::Node;

/// Outgoing action produced by handling one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Send back to the peer the message came from.
    Reply(Message),
    /// Send to every open peer.
    Broadcast(Message),
}

/// Messages sent to a peer as soon as its connection opens.
pub fn greeting() -> Vec<Message> {
    vec![Message::QueryLatest, Message::QueryTxPool]
}

/// Handle one decoded message against the node.
///
/// Accepted blocks, chain replacements and pool changes are announced by the
/// node's own events, so only replies and the full-chain query come back here.
pub fn handle_message(node: &Node, message: Message) -> Option<Outbound> {
    match message {
        Message::QueryLatest => Some(Outbound::Reply(Message::ResponseChain(vec![node.tail()]))),
        Message::QueryAll => Some(Outbound::Reply(Message::ResponseChain(node.get_chain()))),
        Message::QueryTxPool => Some(Outbound::Reply(Message::ResponseTxPool(node.get_tx_pool()))),
        Message::ResponseChain(blocks) => handle_chain(node, blocks),
        Message::ResponseTxPool(txs) => {
            let received = txs.len();
            let admitted = node.receive_transactions(txs);
            debug!("peer pool: {admitted} of {received} txs admitted");
            None
        }
    }
}

fn handle_chain(node: &Node, blocks: Vec<Block>) -> Option<Outbound> {
    let Some(latest) = blocks.last() else {
        debug!("received empty chain");
        return None;
    };
    if let Some(e) = latest
        .transactions
        .iter()
        .find_map(|tx| tx.validate_shape().err())
    {
        debug!("received block {} is malformed: {e}", latest.index);
        return None;
    }

    let tail = node.tail();
    if latest.index <= tail.index {
        debug!(
            "received tail {} is not ahead of ours ({}), ignoring",
            latest.index, tail.index
        );
        return None;
    }

    info!(
        "peer is ahead: their tail {}, ours {}",
        latest.index, tail.index
    );
    if latest.previous_hash == tail.hash {
        let latest = latest.clone();
        // Rejections are logged by the node.
        let _ = node.append_block(latest);
        None
    } else if blocks.len() == 1 {
        debug!("cannot link block {}, querying full chain", latest.index);
        Some(Outbound::Broadcast(Message::QueryAll))
    } else {
        let _ = node.replace_chain(blocks);
        None
    }
}
