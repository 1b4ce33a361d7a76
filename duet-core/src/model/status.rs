use serde::{Deserialize, Serialize};

/// State of the persistent channel to the rendezvous server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Error,
}

/// Peer connection state, as reported by the WebRTC stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PeerState {
    #[default]
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// ICE connection state. Tracked independently of [`PeerState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IceState {
    #[default]
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl IceState {
    pub fn is_established(self) -> bool {
        matches!(self, Self::Connected | Self::Completed)
    }
}

/// Single headline derived from the individual axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverallStatus {
    #[default]
    Idle,
    WaitingForPeer,
    Connecting,
    Connected,
    Reconnecting,
    Ended,
}

/// Aggregated, read-only view of a call's connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub signaling_channel: ChannelStatus,
    pub peer: PeerState,
    pub ice: IceState,
    pub remote_media: bool,
    pub overall: OverallStatus,
}
