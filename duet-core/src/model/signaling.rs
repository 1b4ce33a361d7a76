use crate::model::peer::PeerId;
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: &str) -> Self {
        Self {
            urls: vec![url.to_owned()],
            username: None,
            credential: None,
        }
    }

    pub fn is_turn(&self) -> bool {
        self.urls
            .iter()
            .any(|url| url.starts_with("turn:") || url.starts_with("turns:"))
    }
}

/// Trickle ICE candidate descriptor, shaped like the browser `RTCIceCandidateInit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default)]
    pub sdp_m_line_index: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "op",
    content = "d",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum SignalMessage {
    Welcome {
        peer_id: PeerId,
    },
    JoinRoom {
        room_id: RoomId,
    },
    LeaveRoom {
        room_id: RoomId,
    },
    RoomUsers {
        users: Vec<PeerId>,
    },
    UserJoined {
        peer_id: PeerId,
    },
    UserLeft {
        user_id: PeerId,
    },
    RoomFull,
    Offer {
        sdp: String,
        to: PeerId,
        from: PeerId,
    },
    Answer {
        sdp: String,
        to: PeerId,
        from: PeerId,
    },
    IceCandidate {
        candidate: IceCandidate,
        to: PeerId,
        from: PeerId,
    },
}

/// Discriminant of [`SignalMessage`], used to subscribe to a subset of messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Welcome,
    JoinRoom,
    LeaveRoom,
    RoomUsers,
    UserJoined,
    UserLeft,
    RoomFull,
    Offer,
    Answer,
    IceCandidate,
}

impl SignalMessage {
    pub fn kind(&self) -> SignalKind {
        match self {
            Self::Welcome { .. } => SignalKind::Welcome,
            Self::JoinRoom { .. } => SignalKind::JoinRoom,
            Self::LeaveRoom { .. } => SignalKind::LeaveRoom,
            Self::RoomUsers { .. } => SignalKind::RoomUsers,
            Self::UserJoined { .. } => SignalKind::UserJoined,
            Self::UserLeft { .. } => SignalKind::UserLeft,
            Self::RoomFull => SignalKind::RoomFull,
            Self::Offer { .. } => SignalKind::Offer,
            Self::Answer { .. } => SignalKind::Answer,
            Self::IceCandidate { .. } => SignalKind::IceCandidate,
        }
    }

    /// Recipient of a peer-to-peer negotiation message.
    pub fn target(&self) -> Option<&PeerId> {
        match self {
            Self::Offer { to, .. } | Self::Answer { to, .. } | Self::IceCandidate { to, .. } => {
                Some(to)
            }
            _ => None,
        }
    }

    /// Rewrites the sender of a negotiation message. Other messages are left untouched.
    pub fn with_sender(mut self, sender: PeerId) -> Self {
        match &mut self {
            Self::Offer { from, .. } | Self::Answer { from, .. } | Self::IceCandidate { from, .. } => {
                *from = sender;
            }
            _ => {}
        }
        self
    }
}
