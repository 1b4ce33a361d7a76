use crate::config::ServerConfig;
use crate::room::{Departure, JoinOutcome, RoomManager};
use axum::extract::ws::Message;
use dashmap::DashMap;
use duet_core::{IceServerConfig, PeerId, RoomId, SignalMessage};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

struct PeerLink {
    conn_id: u64,
    tx: mpsc::UnboundedSender<Message>,
}

struct SignalingInner {
    peers: DashMap<PeerId, PeerLink>,
    rooms: RoomManager,
    config: ServerConfig,
    next_conn_id: AtomicU64,
}

/// Routes signaling between connected peers and keeps room membership.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl SignalingService {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                peers: DashMap::new(),
                rooms: RoomManager::new(),
                config,
                next_conn_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn get_ice_servers(&self) -> Vec<IceServerConfig> {
        self.inner.config.ice_servers.clone()
    }

    pub fn api_key(&self) -> Option<&str> {
        self.inner.config.api_key.as_deref()
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.inner.rooms
    }

    pub fn is_connected(&self, peer_id: &PeerId) -> bool {
        self.inner.peers.contains_key(peer_id)
    }

    /// Registers a socket for `peer_id`, replacing any older one. Returns the connection id.
    pub fn add_peer(&self, peer_id: PeerId, tx: mpsc::UnboundedSender<Message>) -> u64 {
        let conn_id = self.inner.next_conn_id.fetch_add(1, Ordering::Relaxed);
        if self
            .inner
            .peers
            .insert(peer_id.clone(), PeerLink { conn_id, tx })
            .is_some()
        {
            info!("Peer {} reconnected, replacing previous socket", peer_id);
        }
        conn_id
    }

    /// Drops the socket `conn_id` of `peer_id`.
    ///
    /// A socket that was already replaced by a newer one leaves membership untouched.
    pub fn remove_peer(&self, peer_id: &PeerId, conn_id: u64) {
        if self
            .inner
            .peers
            .remove_if(peer_id, |_, link| link.conn_id == conn_id)
            .is_none()
        {
            debug!("Stale socket of {} closed", peer_id);
            return;
        }
        self.leave(peer_id);
    }

    pub fn handle_message(&self, peer_id: &PeerId, msg: SignalMessage) {
        match msg {
            SignalMessage::JoinRoom { room_id } => self.join(peer_id, room_id),
            SignalMessage::LeaveRoom { room_id } => {
                if self.inner.rooms.room_of(peer_id).as_ref() == Some(&room_id) {
                    self.leave(peer_id);
                }
            }
            SignalMessage::Offer { .. }
            | SignalMessage::Answer { .. }
            | SignalMessage::IceCandidate { .. } => self.relay(peer_id, msg),
            other => warn!("Unexpected {:?} from {}", other.kind(), peer_id),
        }
    }

    fn join(&self, peer_id: &PeerId, room_id: RoomId) {
        let current = self.inner.rooms.room_of(peer_id);
        if current.as_ref().is_some_and(|r| *r != room_id) {
            self.leave(peer_id);
        }

        match self.inner.rooms.join(peer_id, &room_id) {
            JoinOutcome::Joined { others } | JoinOutcome::Rejoined { others } => {
                info!("Peer {} joined room {} ({} others)", peer_id, room_id, others.len());
                for other in &others {
                    self.send_signal(
                        other,
                        SignalMessage::UserJoined {
                            peer_id: peer_id.clone(),
                        },
                    );
                }
                self.send_signal(peer_id, SignalMessage::RoomUsers { users: others });
            }
            JoinOutcome::Full => {
                info!("Room {} is full, rejecting {}", room_id, peer_id);
                self.send_signal(peer_id, SignalMessage::RoomFull);
            }
        }
    }

    fn leave(&self, peer_id: &PeerId) {
        let Some(Departure { room_id, remaining }) = self.inner.rooms.leave(peer_id) else {
            return;
        };
        info!("Peer {} left room {}", peer_id, room_id);
        for other in &remaining {
            self.send_signal(
                other,
                SignalMessage::UserLeft {
                    user_id: peer_id.clone(),
                },
            );
        }
    }

    fn relay(&self, from: &PeerId, msg: SignalMessage) {
        let Some(to) = msg.target().cloned() else {
            return;
        };
        if !self.inner.rooms.share_room(from, &to) {
            warn!("Dropping {:?} from {} to {}: not in the same room", msg.kind(), from, to);
            return;
        }
        self.send_signal(&to, msg.with_sender(from.clone()));
    }

    pub fn send_signal(&self, peer_id: &PeerId, msg: SignalMessage) {
        if let Some(peer) = self.inner.peers.get(peer_id) {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if let Err(e) = peer.tx.send(Message::Text(json.into())) {
                        error!("Failed to send WS message to {}: {:?}", peer_id, e);
                    }
                }
                Err(e) => error!("Failed to serialize signal message: {}", e),
            }
        } else {
            warn!("Attempted to send signal to disconnected peer {}", peer_id);
        }
    }
}
