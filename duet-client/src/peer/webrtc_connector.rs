use crate::error::{CallError, Result};
use crate::media::{LocalTrack, RemoteTrackInfo};
use crate::peer::{ConnectionEvent, RtcConnection, RtcConnector, RtcEvent, SdpType, SignalingState};
use async_trait::async_trait;
use dashmap::DashMap;
use duet_core::{IceCandidate, IceServerConfig, IceState, PeerState, TrackKind};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::offer_answer_options::RTCOfferOptions;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::stats::StatsReportType;

/// Opens real peer connections with the webrtc-rs stack.
#[derive(Debug, Default, Clone)]
pub struct WebRtcConnector;

pub struct WebRtcConnection {
    generation: u64,
    peer_connection: Arc<RTCPeerConnection>,
    senders: DashMap<TrackKind, Arc<RTCRtpSender>>,
}

#[async_trait]
impl RtcConnector for WebRtcConnector {
    async fn connect(
        &self,
        ice_servers: &[IceServerConfig],
        generation: u64,
        events: mpsc::Sender<ConnectionEvent>,
    ) -> Result<Arc<dyn RtcConnection>> {
        let connection = WebRtcConnection::new(ice_servers, generation, events).await?;
        Ok(Arc::new(connection))
    }
}

impl WebRtcConnection {
    pub async fn new(
        ice_servers: &[IceServerConfig],
        generation: u64,
        event_tx: mpsc::Sender<ConnectionEvent>,
    ) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        let state_tx = event_tx.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();

                Box::pin(async move {
                    info!("Peer connection #{} state changed: {:?}", generation, s);
                    let Some(state) = peer_state(s) else { return };
                    let _ = tx
                        .send(ConnectionEvent {
                            generation,
                            event: RtcEvent::StateChanged(state),
                        })
                        .await;
                })
            },
        ));

        let ice_state_tx = event_tx.clone();
        peer_connection.on_ice_connection_state_change(Box::new(
            move |s: RTCIceConnectionState| {
                let tx = ice_state_tx.clone();

                Box::pin(async move {
                    debug!("ICE connection #{} state changed: {:?}", generation, s);
                    let Some(state) = ice_state(s) else { return };
                    let _ = tx
                        .send(ConnectionEvent {
                            generation,
                            event: RtcEvent::IceStateChanged(state),
                        })
                        .await;
                })
            },
        ));

        let ice_tx = event_tx.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let candidate = IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                };
                let _ = tx
                    .send(ConnectionEvent {
                        generation,
                        event: RtcEvent::LocalCandidate(candidate),
                    })
                    .await;
            })
        }));

        let track_tx = event_tx;
        peer_connection.on_track(Box::new(move |track, _receiver, _transceiver| {
            let tx = track_tx.clone();

            Box::pin(async move {
                let kind = match track.kind() {
                    RTPCodecType::Audio => TrackKind::Audio,
                    RTPCodecType::Video => TrackKind::Video,
                    _ => return,
                };
                let info = RemoteTrackInfo {
                    kind,
                    track_id: track.id(),
                    stream_id: track.stream_id(),
                };
                debug!("Remote {:?} track arrived on #{}", kind, generation);
                let _ = tx
                    .send(ConnectionEvent {
                        generation,
                        event: RtcEvent::TrackReceived(info),
                    })
                    .await;
            })
        }));

        Ok(Self {
            generation,
            peer_connection,
            senders: DashMap::new(),
        })
    }

    fn description(kind: SdpType, sdp: String) -> Result<RTCSessionDescription> {
        let desc = match kind {
            SdpType::Offer => RTCSessionDescription::offer(sdp)?,
            SdpType::Answer => RTCSessionDescription::answer(sdp)?,
        };
        Ok(desc)
    }
}

#[async_trait]
impl RtcConnection for WebRtcConnection {
    async fn add_track(&self, track: &LocalTrack) -> Result<()> {
        let sender = self.peer_connection.add_track(track.rtp_track()).await?;

        // RTCP has to be drained for interceptors (NACK, reports) to work.
        let rtcp_sender = sender.clone();
        tokio::spawn(async move {
            let mut rtcp_buf = vec![0u8; 1500];
            while rtcp_sender.read(&mut rtcp_buf).await.is_ok() {}
        });

        self.senders.insert(track.kind(), sender);
        Ok(())
    }

    async fn replace_track(&self, kind: TrackKind, track: &LocalTrack) -> Result<bool> {
        let Some(sender) = self.senders.get(&kind).map(|s| s.value().clone()) else {
            return Ok(false);
        };
        sender.replace_track(Some(track.rtp_track())).await?;
        Ok(true)
    }

    async fn create_offer(&self, ice_restart: bool) -> Result<String> {
        // Restarting needs a running ICE agent, which a fresh connection does not have yet.
        let ice_restart = ice_restart && self.peer_connection.local_description().await.is_some();
        let options = ice_restart.then(|| RTCOfferOptions {
            ice_restart,
            ..Default::default()
        });
        let offer = self.peer_connection.create_offer(options).await?;
        Ok(offer.sdp)
    }

    async fn create_answer(&self) -> Result<String> {
        let answer = self.peer_connection.create_answer(None).await?;
        Ok(answer.sdp)
    }

    async fn set_local_description(&self, kind: SdpType, sdp: String) -> Result<()> {
        let desc = Self::description(kind, sdp)?;
        self.peer_connection.set_local_description(desc).await?;
        Ok(())
    }

    async fn set_remote_description(&self, kind: SdpType, sdp: String) -> Result<()> {
        let desc = Self::description(kind, sdp)?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    fn signaling_state(&self) -> SignalingState {
        match self.peer_connection.signaling_state() {
            RTCSignalingState::Stable => SignalingState::Stable,
            RTCSignalingState::HaveLocalOffer => SignalingState::HaveLocalOffer,
            RTCSignalingState::HaveRemoteOffer => SignalingState::HaveRemoteOffer,
            RTCSignalingState::Closed => SignalingState::Closed,
            _ => SignalingState::Other,
        }
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: None,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(|e| CallError::IceFailure(e.to_string()))
    }

    async fn selected_candidate_pair(&self) -> Option<String> {
        let stats = self.peer_connection.get_stats().await;
        let pair = stats.reports.values().find_map(|report| match report {
            StatsReportType::CandidatePair(pair) if pair.nominated => Some(pair),
            _ => None,
        })?;

        let endpoint = |id: &str| {
            stats.reports.get(id).and_then(|report| match report {
                StatsReportType::LocalCandidate(c) | StatsReportType::RemoteCandidate(c) => {
                    Some(format!("{}:{}", c.ip, c.port))
                }
                _ => None,
            })
        };
        let local = endpoint(&pair.local_candidate_id).unwrap_or_else(|| pair.local_candidate_id.clone());
        let remote =
            endpoint(&pair.remote_candidate_id).unwrap_or_else(|| pair.remote_candidate_id.clone());
        Some(format!("{} <-> {}", local, remote))
    }

    async fn close(&self) -> Result<()> {
        trace!("Closing peer connection #{}", self.generation);
        self.senders.clear();
        self.peer_connection.close().await?;
        Ok(())
    }
}

fn peer_state(state: RTCPeerConnectionState) -> Option<PeerState> {
    match state {
        RTCPeerConnectionState::New => Some(PeerState::New),
        RTCPeerConnectionState::Connecting => Some(PeerState::Connecting),
        RTCPeerConnectionState::Connected => Some(PeerState::Connected),
        RTCPeerConnectionState::Disconnected => Some(PeerState::Disconnected),
        RTCPeerConnectionState::Failed => Some(PeerState::Failed),
        RTCPeerConnectionState::Closed => Some(PeerState::Closed),
        _ => None,
    }
}

fn ice_state(state: RTCIceConnectionState) -> Option<IceState> {
    match state {
        RTCIceConnectionState::New => Some(IceState::New),
        RTCIceConnectionState::Checking => Some(IceState::Checking),
        RTCIceConnectionState::Connected => Some(IceState::Connected),
        RTCIceConnectionState::Completed => Some(IceState::Completed),
        RTCIceConnectionState::Disconnected => Some(IceState::Disconnected),
        RTCIceConnectionState::Failed => Some(IceState::Failed),
        RTCIceConnectionState::Closed => Some(IceState::Closed),
        _ => None,
    }
}
