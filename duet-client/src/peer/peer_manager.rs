use crate::error::{CallError, Result};
use crate::media::{LocalTrack, MediaStream, RemoteStream, RemoteTrackInfo, TrackPublisher};
use crate::peer::{
    ConnectionEvent, NegotiationRole, PeerConnectionState, RtcConnection, RtcConnector, RtcEvent,
    SdpType, SignalingState,
};
use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use duet_core::{IceCandidate, IceServerConfig, IceState, PeerId, PeerState, TrackKind};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Change worth reacting to, produced from a raw connection event.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerUpdate {
    State(PeerState),
    Ice(IceState),
    RemoteStream(RemoteStream),
}

struct ActivePeer {
    connection: Arc<dyn RtcConnection>,
    state: PeerConnectionState,
    pending_candidates: Vec<IceCandidate>,
    remote_tracks: Vec<RemoteTrackInfo>,
}

/// Owns the one peer connection of a call and drives offer/answer/ICE on it.
///
/// Every connection gets a fresh generation number. Events carrying any other generation
/// come from a superseded connection and are dropped.
pub struct PeerConnectionManager {
    local_peer: PeerId,
    connector: Arc<dyn RtcConnector>,
    signaling: Arc<dyn SignalingOutput>,
    ice_servers: Vec<IceServerConfig>,
    events_tx: mpsc::Sender<ConnectionEvent>,
    next_generation: u64,
    active: Option<ActivePeer>,
}

impl PeerConnectionManager {
    pub fn new(
        local_peer: PeerId,
        connector: Arc<dyn RtcConnector>,
        signaling: Arc<dyn SignalingOutput>,
        ice_servers: Vec<IceServerConfig>,
        events_tx: mpsc::Sender<ConnectionEvent>,
    ) -> Self {
        Self {
            local_peer,
            connector,
            signaling,
            ice_servers,
            events_tx,
            next_generation: 0,
            active: None,
        }
    }

    pub fn local_peer(&self) -> &PeerId {
        &self.local_peer
    }

    pub fn remote_peer(&self) -> Option<&PeerId> {
        self.active.as_ref().map(|a| &a.state.remote_peer)
    }

    pub fn state(&self) -> Option<&PeerConnectionState> {
        self.active.as_ref().map(|a| &a.state)
    }

    pub fn has_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn set_ice_servers(&mut self, ice_servers: Vec<IceServerConfig>) {
        self.ice_servers = ice_servers;
    }

    /// Supersedes any prior connection with a fresh one and sends it an offer.
    pub async fn create_offer(&mut self, remote: PeerId, stream: &MediaStream) -> Result<()> {
        self.close().await;
        let connection = self
            .open(remote.clone(), NegotiationRole::Offerer, stream)
            .await?;

        let sdp = connection
            .create_offer(true)
            .await
            .map_err(|e| CallError::negotiation("create offer", e))?;
        connection
            .set_local_description(SdpType::Offer, sdp.clone())
            .await
            .map_err(|e| CallError::negotiation("apply local offer", e))?;
        if let Some(active) = self.active.as_mut() {
            active.state.local_description = Some(sdp.clone());
        }

        info!(remote = %remote, generation = self.next_generation, "Sending offer");
        self.signaling.send_offer(remote, sdp).await
    }

    /// Answers a remote offer on a fresh connection.
    ///
    /// Returns `false` when the offer collided with our own pending offer and we keep ours.
    pub async fn handle_offer(
        &mut self,
        from: PeerId,
        sdp: String,
        stream: &MediaStream,
    ) -> Result<bool> {
        if let Some(active) = self.active.as_ref()
            && active.state.remote_peer == from
            && active.connection.signaling_state() == SignalingState::HaveLocalOffer
            && self.local_peer > from
        {
            info!(remote = %from, "Offer collision, keeping local offer");
            return Ok(false);
        }

        self.close().await;
        let connection = self
            .open(from.clone(), NegotiationRole::Answerer, stream)
            .await?;

        connection
            .set_remote_description(SdpType::Offer, sdp.clone())
            .await
            .map_err(|e| CallError::negotiation("apply remote offer", e))?;
        if let Some(active) = self.active.as_mut() {
            active.state.remote_description = Some(sdp);
        }
        self.flush_pending_candidates().await;

        let answer = connection
            .create_answer()
            .await
            .map_err(|e| CallError::negotiation("create answer", e))?;
        connection
            .set_local_description(SdpType::Answer, answer.clone())
            .await
            .map_err(|e| CallError::negotiation("apply local answer", e))?;
        if let Some(active) = self.active.as_mut() {
            active.state.local_description = Some(answer.clone());
        }

        info!(remote = %from, generation = self.next_generation, "Sending answer");
        self.signaling.send_answer(from, answer).await?;
        Ok(true)
    }

    /// Applies an answer unless negotiation already finished. Returns whether it was applied.
    pub async fn handle_answer(&mut self, from: PeerId, sdp: String) -> Result<bool> {
        let Some(active) = self.active.as_mut() else {
            debug!(remote = %from, "Answer without a connection, ignoring");
            return Ok(false);
        };
        if active.state.remote_peer != from {
            warn!(remote = %from, "Answer from unexpected peer, ignoring");
            return Ok(false);
        }
        if active.connection.signaling_state() == SignalingState::Stable {
            debug!(remote = %from, "Late or duplicate answer, ignoring");
            return Ok(false);
        }

        active
            .connection
            .set_remote_description(SdpType::Answer, sdp.clone())
            .await
            .map_err(|e| CallError::negotiation("apply remote answer", e))?;
        active.state.remote_description = Some(sdp);
        self.flush_pending_candidates().await;
        Ok(true)
    }

    /// Adds a remote candidate, buffering it until a remote description exists.
    pub async fn handle_ice_candidate(&mut self, from: PeerId, candidate: IceCandidate) -> Result<()> {
        let Some(active) = self.active.as_mut() else {
            trace!(remote = %from, "Candidate without a connection, discarding");
            return Ok(());
        };
        if active.state.remote_peer != from {
            trace!(remote = %from, "Candidate from unexpected peer, discarding");
            return Ok(());
        }

        active.state.remote_candidates += 1;
        if active.state.remote_description.is_none() {
            active.pending_candidates.push(candidate);
            return Ok(());
        }
        active.connection.add_ice_candidate(candidate).await
    }

    pub async fn handle_connection_event(&mut self, event: ConnectionEvent) -> Option<PeerUpdate> {
        let Some(active) = self.active.as_mut() else {
            trace!(generation = event.generation, "Event after close, dropping");
            return None;
        };
        if event.generation != active.state.generation {
            trace!(
                generation = event.generation,
                current = active.state.generation,
                "Event from superseded connection, dropping"
            );
            return None;
        }

        match event.event {
            RtcEvent::StateChanged(state) => {
                active.state.connection_state = state;
                if state == PeerState::Connected {
                    active.state.selected_candidate_pair =
                        active.connection.selected_candidate_pair().await;
                    info!(
                        remote = %active.state.remote_peer,
                        role = ?active.state.role,
                        pair = ?active.state.selected_candidate_pair,
                        local_candidates = active.state.local_candidates,
                        remote_candidates = active.state.remote_candidates,
                        "Peer connected"
                    );
                }
                Some(PeerUpdate::State(state))
            }
            RtcEvent::IceStateChanged(state) => {
                active.state.ice_connection_state = state;
                Some(PeerUpdate::Ice(state))
            }
            RtcEvent::LocalCandidate(candidate) => {
                active.state.local_candidates += 1;
                let to = active.state.remote_peer.clone();
                if let Err(e) = self.signaling.send_ice(to, candidate).await {
                    warn!("Failed to send local candidate: {}", e);
                }
                None
            }
            RtcEvent::TrackReceived(track) => {
                if !active.remote_tracks.iter().any(|t| t.track_id == track.track_id) {
                    active.remote_tracks.push(track);
                }
                if active.state.remote_stream_published {
                    return None;
                }

                let expected = active
                    .state
                    .remote_description
                    .as_deref()
                    .map(sending_kinds)
                    .unwrap_or_default();
                let complete = expected
                    .iter()
                    .all(|kind| active.remote_tracks.iter().any(|t| t.kind == *kind));
                if !complete {
                    return None;
                }

                active.state.remote_stream_published = true;
                let stream = RemoteStream {
                    stream_id: active.remote_tracks[0].stream_id.clone(),
                    tracks: active.remote_tracks.clone(),
                };
                Some(PeerUpdate::RemoteStream(stream))
            }
        }
    }

    /// Closes the active connection, if any. Returns whether one was open.
    pub async fn close(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        if let Err(e) = active.connection.close().await {
            warn!("Error while closing peer connection: {}", e);
        }
        debug!(
            remote = %active.state.remote_peer,
            generation = active.state.generation,
            "Peer connection closed"
        );
        true
    }

    async fn open(
        &mut self,
        remote: PeerId,
        role: NegotiationRole,
        stream: &MediaStream,
    ) -> Result<Arc<dyn RtcConnection>> {
        self.next_generation += 1;
        let generation = self.next_generation;
        let connection = self
            .connector
            .connect(&self.ice_servers, generation, self.events_tx.clone())
            .await?;

        for track in stream.tracks().iter().filter(|t| t.is_live()) {
            if let Err(e) = connection.add_track(track).await {
                let _ = connection.close().await;
                return Err(e);
            }
        }

        self.active = Some(ActivePeer {
            connection: connection.clone(),
            state: PeerConnectionState::new(generation, remote, role),
            pending_candidates: Vec::new(),
            remote_tracks: Vec::new(),
        });
        Ok(connection)
    }

    async fn flush_pending_candidates(&mut self) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let pending = std::mem::take(&mut active.pending_candidates);
        if !pending.is_empty() {
            debug!(count = pending.len(), "Flushing buffered remote candidates");
        }
        for candidate in pending {
            if let Err(e) = active.connection.add_ice_candidate(candidate).await {
                warn!("Failed to add buffered candidate: {}", e);
            }
        }
    }
}

#[async_trait]
impl TrackPublisher for PeerConnectionManager {
    async fn replace_outbound_track(&self, kind: TrackKind, track: &LocalTrack) -> Result<bool> {
        let Some(active) = self.active.as_ref() else {
            return Ok(false);
        };
        active.connection.replace_track(kind, track).await
    }
}

/// Media kinds the remote side announced it will send.
fn sending_kinds(sdp: &str) -> Vec<TrackKind> {
    let mut kinds: Vec<TrackKind> = Vec::new();
    let mut current: Option<TrackKind> = None;
    let mut sending = true;

    let mut finish = |kind: Option<TrackKind>, sending: bool| {
        if let Some(kind) = kind
            && sending
            && !kinds.contains(&kind)
        {
            kinds.push(kind);
        }
    };

    for line in sdp.lines() {
        if let Some(media) = line.strip_prefix("m=") {
            finish(current, sending);
            sending = true;
            current = if media.starts_with("audio") {
                Some(TrackKind::Audio)
            } else if media.starts_with("video") {
                Some(TrackKind::Video)
            } else {
                None
            };
        } else if line == "a=recvonly" || line == "a=inactive" {
            sending = false;
        }
    }
    finish(current, sending);
    kinds
}
