use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{WebSocketStream, accept_async, connect_async};
use uuid::Uuid;

use super::message::Message;
use super::protocol::{Outbound, greeting, handle_message};
use crate::node::{Node, NodeEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerInfo {
    pub id: Uuid,
    /// Dialed URL for outbound peers, remote socket address for inbound ones.
    pub address: String,
    pub outbound: bool,
    pub state: ConnectionState,
}

struct Peer {
    info: PeerInfo,
    sender: Option<UnboundedSender<WsMessage>>,
}

/// The peer set and the WebSocket transport feeding the sync protocol.
pub struct P2pNetwork {
    node: Arc<Node>,
    peers: Mutex<HashMap<Uuid, Peer>>,
}

impl P2pNetwork {
    pub fn new(node: Arc<Node>) -> Arc<Self> {
        Arc::new(Self {
            node,
            peers: Mutex::new(HashMap::new()),
        })
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    fn peers(&self) -> MutexGuard<'_, HashMap<Uuid, Peer>> {
        self.peers.lock().expect("mutex poisoned")
    }

    /// Every known peer, connecting or open.
    pub fn list_peers(&self) -> Vec<PeerInfo> {
        let mut peers: Vec<PeerInfo> = self.peers().values().map(|p| p.info.clone()).collect();
        peers.sort_by(|a, b| a.address.cmp(&b.address));
        peers
    }

    fn register(&self, address: String, outbound: bool) -> Uuid {
        let id = Uuid::new_v4();
        let info = PeerInfo {
            id,
            address,
            outbound,
            state: ConnectionState::Connecting,
        };
        debug!("peer {id} connecting: {}", info.address);
        self.peers().insert(id, Peer { info, sender: None });
        id
    }

    fn open(&self, id: Uuid, sender: UnboundedSender<WsMessage>) {
        if let Some(peer) = self.peers().get_mut(&id) {
            peer.info.state = ConnectionState::Open;
            peer.sender = Some(sender);
            info!("peer {id} open: {}", peer.info.address);
        }
    }

    /// Closed peers leave the set; nothing redials them.
    fn close(&self, id: Uuid) {
        if let Some(mut peer) = self.peers().remove(&id) {
            peer.info.state = ConnectionState::Closed;
            info!("peer {id} {:?}: {}", peer.info.state, peer.info.address);
        }
    }

    fn encode(message: &Message) -> Option<WsMessage> {
        match message.to_json() {
            Ok(text) => Some(WsMessage::Text(text)),
            Err(e) => {
                error!("failed to encode {:?}: {e}", message.message_type());
                None
            }
        }
    }

    pub fn send_to(&self, id: Uuid, message: &Message) {
        let Some(frame) = Self::encode(message) else {
            return;
        };
        if let Some(sender) = self.peers().get(&id).and_then(|p| p.sender.as_ref()) {
            let _ = sender.send(frame);
        }
    }

    /// Send `message` to every open peer.
    pub fn broadcast(&self, message: &Message) {
        let Some(frame) = Self::encode(message) else {
            return;
        };
        let peers = self.peers();
        debug!(
            "broadcasting {:?} to {} peers",
            message.message_type(),
            peers.len()
        );
        for sender in peers.values().filter_map(|p| p.sender.as_ref()) {
            let _ = sender.send(frame.clone());
        }
    }

    /// Announce node events to all peers: the new tail as a one-block chain
    /// response and every pool change as a pool response.
    pub fn spawn_event_relay(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.node.subscribe();
        let net = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(NodeEvent::NewTail(block)) => {
                        net.broadcast(&Message::ResponseChain(vec![block]))
                    }
                    Ok(NodeEvent::TxPoolChanged(txs)) => {
                        net.broadcast(&Message::ResponseTxPool(txs))
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("event relay lagged, {skipped} events skipped")
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    pub async fn bind(addr: &str) -> std::io::Result<TcpListener> {
        let listener = TcpListener::bind(addr).await?;
        info!("p2p listening on ws://{}", listener.local_addr()?);
        Ok(listener)
    }

    /// Accept peers on `listener` forever.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        loop {
            let (stream, remote) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("p2p accept failed: {e}");
                    continue;
                }
            };
            let net = self.clone();
            tokio::spawn(async move {
                let id = net.register(remote.to_string(), false);
                match accept_async(stream).await {
                    Ok(ws) => net.run_connection(id, ws).await,
                    Err(e) => {
                        warn!("websocket handshake with {remote} failed: {e}");
                        net.close(id);
                    }
                }
            });
        }
    }

    pub async fn listen(self: Arc<Self>, addr: &str) -> std::io::Result<()> {
        let listener = Self::bind(addr).await?;
        self.serve(listener).await;
        Ok(())
    }

    /// Dial `url` in the background. Failure is logged and the peer dropped.
    pub fn connect_peer(self: &Arc<Self>, url: impl Into<String>) -> Uuid {
        let url = url.into();
        let id = self.register(url.clone(), true);
        let net = self.clone();
        tokio::spawn(async move {
            match connect_async(url.as_str()).await {
                Ok((ws, _)) => net.run_connection(id, ws).await,
                Err(e) => {
                    error!("connection to {url} failed: {e}");
                    net.close(id);
                }
            }
        });
        id
    }

    async fn run_connection<S>(self: Arc<Self>, id: Uuid, ws: WebSocketStream<S>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut write, mut read) = ws.split();
        let (sender, mut outgoing) = mpsc::unbounded_channel::<WsMessage>();

        let writer = tokio::spawn(async move {
            while let Some(frame) = outgoing.recv().await {
                if let Err(e) = write.send(frame).await {
                    debug!("peer {id} write failed: {e}");
                    break;
                }
            }
            let _ = write.close().await;
        });

        self.open(id, sender);
        for message in greeting() {
            self.send_to(id, &message);
        }

        while let Some(frame) = read.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => self.on_text(id, &text),
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("peer {id} connection error: {e}");
                    break;
                }
            }
        }

        // Dropping the sender ends the writer.
        self.close(id);
        let _ = writer.await;
    }

    fn on_text(&self, id: Uuid, text: &str) {
        let message = match Message::from_json(text) {
            Ok(m) => m,
            Err(e) => {
                warn!("peer {id} sent an unreadable message: {e}");
                return;
            }
        };
        debug!("peer {id} -> {:?}", message.message_type());
        match handle_message(&self.node, message) {
            Some(Outbound::Reply(reply)) => self.send_to(id, &reply),
            Some(Outbound::Broadcast(query)) => self.broadcast(&query),
            None => {}
        }
    }
}
