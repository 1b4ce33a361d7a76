use duet_core::{ChannelStatus, ConnectionStatus, IceState, OverallStatus, PeerState};
use tokio::sync::watch;

/// Publishes the merged connectivity view of a call.
pub struct ConnectionStatusAggregator {
    status: ConnectionStatus,
    ended: bool,
    tx: watch::Sender<ConnectionStatus>,
}

impl Default for ConnectionStatusAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionStatusAggregator {
    pub fn new() -> Self {
        let status = ConnectionStatus::default();
        let (tx, _) = watch::channel(status);
        Self {
            status,
            ended: false,
            tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> ConnectionStatus {
        self.status
    }

    pub fn set_channel(&mut self, status: ChannelStatus) {
        self.status.signaling_channel = status;
        self.publish();
    }

    pub fn set_peer(&mut self, state: PeerState) {
        self.status.peer = state;
        self.publish();
    }

    pub fn set_ice(&mut self, state: IceState) {
        self.status.ice = state;
        self.publish();
    }

    pub fn set_remote_media(&mut self, flowing: bool) {
        self.status.remote_media = flowing;
        self.publish();
    }

    /// A new peer connection replaced the previous one and is negotiating.
    pub fn begin_connection(&mut self) {
        self.status.peer = PeerState::Connecting;
        self.status.ice = IceState::New;
        self.status.remote_media = false;
        self.publish();
    }

    /// Forgets the peer axes after the remote participant went away.
    pub fn reset_peer(&mut self) {
        self.status.peer = PeerState::New;
        self.status.ice = IceState::New;
        self.status.remote_media = false;
        self.publish();
    }

    pub fn mark_ended(&mut self) {
        self.ended = true;
        self.publish();
    }

    fn publish(&mut self) {
        self.status.overall = derive(&self.status, self.ended);
        let next = self.status;
        self.tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

/// Headline status from the individual axes. The `overall` field of `status` is ignored.
pub fn derive(status: &ConnectionStatus, ended: bool) -> OverallStatus {
    if ended {
        return OverallStatus::Ended;
    }

    let peer_lost = matches!(status.peer, PeerState::Disconnected | PeerState::Failed)
        || matches!(status.ice, IceState::Disconnected | IceState::Failed);
    if peer_lost {
        return OverallStatus::Reconnecting;
    }
    if status.peer == PeerState::Connected || status.ice.is_established() || status.remote_media {
        return OverallStatus::Connected;
    }

    match status.signaling_channel {
        ChannelStatus::Disconnected => OverallStatus::Idle,
        ChannelStatus::Connecting => OverallStatus::Connecting,
        ChannelStatus::Reconnecting | ChannelStatus::Error => OverallStatus::Reconnecting,
        ChannelStatus::Connected => {
            let idle_peer = matches!(status.peer, PeerState::New | PeerState::Closed)
                && matches!(status.ice, IceState::New | IceState::Closed);
            if idle_peer {
                OverallStatus::WaitingForPeer
            } else {
                OverallStatus::Connecting
            }
        }
    }
}
