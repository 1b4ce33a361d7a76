use async_trait::async_trait;
use duet_client::error::{CallError, Result};
use duet_client::media::{LocalTrack, RemoteTrackInfo};
use duet_client::peer::{
    ConnectionEvent, RtcConnection, RtcConnector, RtcEvent, SdpType, SignalingState,
};
use duet_core::{IceCandidate, IceServerConfig, IceState, PeerState, TrackKind};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Connector handing out scripted connections and remembering every one of them.
#[derive(Clone)]
pub struct MockRtcConnector {
    auto_connect: bool,
    connections: Arc<Mutex<Vec<Arc<MockRtcConnection>>>>,
    ice_servers: Arc<Mutex<Vec<Vec<IceServerConfig>>>>,
}

impl MockRtcConnector {
    /// Connections report connected (and remote tracks) once negotiation is stable.
    pub fn new() -> Self {
        Self::with_auto_connect(true)
    }

    /// Connections only emit what the test emits.
    pub fn manual() -> Self {
        Self::with_auto_connect(false)
    }

    fn with_auto_connect(auto_connect: bool) -> Self {
        Self {
            auto_connect,
            connections: Arc::new(Mutex::new(Vec::new())),
            ice_servers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn connections(&self) -> Vec<Arc<MockRtcConnection>> {
        self.connections.lock().unwrap().clone()
    }

    pub fn latest(&self) -> Option<Arc<MockRtcConnection>> {
        self.connections.lock().unwrap().last().cloned()
    }

    pub fn open_count(&self) -> usize {
        self.connections().iter().filter(|c| !c.is_closed()).count()
    }

    pub fn ice_servers_used(&self) -> Vec<Vec<IceServerConfig>> {
        self.ice_servers.lock().unwrap().clone()
    }
}

#[async_trait]
impl RtcConnector for MockRtcConnector {
    async fn connect(
        &self,
        ice_servers: &[IceServerConfig],
        generation: u64,
        events: mpsc::Sender<ConnectionEvent>,
    ) -> Result<Arc<dyn RtcConnection>> {
        self.ice_servers.lock().unwrap().push(ice_servers.to_vec());
        let connection = Arc::new(MockRtcConnection {
            generation,
            auto_connect: self.auto_connect,
            events,
            state: Mutex::new(MockState::default()),
        });
        self.connections.lock().unwrap().push(connection.clone());
        Ok(connection)
    }
}

#[derive(Debug, Clone)]
pub struct MockSender {
    pub kind: TrackKind,
    pub track_id: String,
    pub device_id: String,
}

struct MockState {
    signaling: SignalingState,
    local: Option<String>,
    remote: Option<String>,
    senders: Vec<MockSender>,
    replaced: Vec<MockSender>,
    candidates: Vec<IceCandidate>,
    offers: Vec<bool>,
    closed: bool,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            signaling: SignalingState::Stable,
            local: None,
            remote: None,
            senders: Vec::new(),
            replaced: Vec::new(),
            candidates: Vec::new(),
            offers: Vec::new(),
            closed: false,
        }
    }
}

pub struct MockRtcConnection {
    pub generation: u64,
    auto_connect: bool,
    events: mpsc::Sender<ConnectionEvent>,
    state: Mutex<MockState>,
}

impl MockRtcConnection {
    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    pub fn senders(&self) -> Vec<MockSender> {
        self.state.lock().unwrap().senders.clone()
    }

    pub fn replaced(&self) -> Vec<MockSender> {
        self.state.lock().unwrap().replaced.clone()
    }

    pub fn remote_candidates(&self) -> Vec<IceCandidate> {
        self.state.lock().unwrap().candidates.clone()
    }

    /// `ice_restart` flag of every offer created on this connection.
    pub fn offers(&self) -> Vec<bool> {
        self.state.lock().unwrap().offers.clone()
    }

    pub fn remote_description(&self) -> Option<String> {
        self.state.lock().unwrap().remote.clone()
    }

    /// Injects a callback event as if the stack produced it.
    pub async fn emit(&self, event: RtcEvent) {
        let _ = self
            .events
            .send(ConnectionEvent {
                generation: self.generation,
                event,
            })
            .await;
    }

    fn sdp(&self, kind: &str, senders: &[MockSender]) -> String {
        let mut sdp = format!("v=0\r\no=mock {} 0 IN IP4 127.0.0.1\r\ns={}\r\n", self.generation, kind);
        for sender in senders {
            let media = match sender.kind {
                TrackKind::Audio => "audio",
                TrackKind::Video => "video",
            };
            sdp.push_str(&format!(
                "m={} 9 UDP/TLS/RTP/SAVPF 96\r\na=sendrecv\r\na=msid:stream-{} {}\r\n",
                media, self.generation, sender.track_id
            ));
        }
        sdp
    }

    fn on_stable(&self, remote_sdp: &str) {
        if !self.auto_connect {
            return;
        }
        let mut script = vec![
            RtcEvent::LocalCandidate(IceCandidate {
                candidate: format!("candidate:{} 1 udp 2122260223 127.0.0.1 5000 typ host", self.generation),
                sdp_mid: Some("0".into()),
                sdp_m_line_index: Some(0),
            }),
            RtcEvent::StateChanged(PeerState::Connecting),
            RtcEvent::IceStateChanged(IceState::Checking),
            RtcEvent::IceStateChanged(IceState::Connected),
            RtcEvent::StateChanged(PeerState::Connected),
        ];
        for (index, line) in remote_sdp.lines().filter(|l| l.starts_with("m=")).enumerate() {
            let kind = if line.starts_with("m=audio") {
                TrackKind::Audio
            } else {
                TrackKind::Video
            };
            script.push(RtcEvent::TrackReceived(RemoteTrackInfo {
                kind,
                track_id: format!("remote-{}-{}", self.generation, index),
                stream_id: format!("remote-stream-{}", self.generation),
            }));
        }

        let events = self.events.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            for event in script {
                let _ = events.send(ConnectionEvent { generation, event }).await;
            }
        });
    }
}

#[async_trait]
impl RtcConnection for MockRtcConnection {
    async fn add_track(&self, track: &LocalTrack) -> Result<()> {
        self.state.lock().unwrap().senders.push(MockSender {
            kind: track.kind(),
            track_id: track.id().to_owned(),
            device_id: track.device_id().to_owned(),
        });
        Ok(())
    }

    async fn replace_track(&self, kind: TrackKind, track: &LocalTrack) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(sender) = state.senders.iter_mut().find(|s| s.kind == kind) else {
            return Ok(false);
        };
        sender.track_id = track.id().to_owned();
        sender.device_id = track.device_id().to_owned();
        let replacement = sender.clone();
        state.replaced.push(replacement);
        Ok(true)
    }

    async fn create_offer(&self, ice_restart: bool) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Err(CallError::Negotiation("connection closed".into()));
        }
        state.offers.push(ice_restart);
        Ok(self.sdp("offer", &state.senders))
    }

    async fn create_answer(&self) -> Result<String> {
        let state = self.state.lock().unwrap();
        if state.signaling != SignalingState::HaveRemoteOffer {
            return Err(CallError::Negotiation("no remote offer".into()));
        }
        Ok(self.sdp("answer", &state.senders))
    }

    async fn set_local_description(&self, kind: SdpType, sdp: String) -> Result<()> {
        let stable_remote = {
            let mut state = self.state.lock().unwrap();
            match kind {
                SdpType::Offer => {
                    state.signaling = SignalingState::HaveLocalOffer;
                    state.local = Some(sdp);
                    None
                }
                SdpType::Answer => {
                    if state.signaling != SignalingState::HaveRemoteOffer {
                        return Err(CallError::Negotiation("answer without remote offer".into()));
                    }
                    state.signaling = SignalingState::Stable;
                    state.local = Some(sdp);
                    state.remote.clone()
                }
            }
        };
        if let Some(remote) = stable_remote {
            self.on_stable(&remote);
        }
        Ok(())
    }

    async fn set_remote_description(&self, kind: SdpType, sdp: String) -> Result<()> {
        let stable_remote = {
            let mut state = self.state.lock().unwrap();
            match kind {
                SdpType::Offer => {
                    state.signaling = SignalingState::HaveRemoteOffer;
                    state.remote = Some(sdp);
                    None
                }
                SdpType::Answer => {
                    if state.signaling != SignalingState::HaveLocalOffer {
                        return Err(CallError::Negotiation("answer without local offer".into()));
                    }
                    state.signaling = SignalingState::Stable;
                    state.remote = Some(sdp.clone());
                    Some(sdp)
                }
            }
        };
        if let Some(remote) = stable_remote {
            self.on_stable(&remote);
        }
        Ok(())
    }

    fn signaling_state(&self) -> SignalingState {
        self.state.lock().unwrap().signaling
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.remote.is_none() {
            return Err(CallError::IceFailure("remote description not set".into()));
        }
        state.candidates.push(candidate);
        Ok(())
    }

    async fn selected_candidate_pair(&self) -> Option<String> {
        Some("127.0.0.1:5000 <-> 127.0.0.1:5001".into())
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        state.signaling = SignalingState::Closed;
        Ok(())
    }
}
