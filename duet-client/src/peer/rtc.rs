use crate::error::Result;
use crate::media::{LocalTrack, RemoteTrackInfo};
use async_trait::async_trait;
use duet_core::{IceCandidate, IceServerConfig, IceState, PeerState, TrackKind};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpType {
    Offer,
    Answer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    Closed,
    Other,
}

/// Callback output of a single RTC connection.
#[derive(Debug, Clone, PartialEq)]
pub enum RtcEvent {
    StateChanged(PeerState),
    IceStateChanged(IceState),
    LocalCandidate(IceCandidate),
    TrackReceived(RemoteTrackInfo),
}

/// Event tagged with the generation of the connection that produced it.
///
/// A closed connection may still flush callbacks; the generation lets the owner drop them.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionEvent {
    pub generation: u64,
    pub event: RtcEvent,
}

#[async_trait]
pub trait RtcConnection: Send + Sync {
    async fn add_track(&self, track: &LocalTrack) -> Result<()>;

    /// Swaps the outbound track of `kind`. Returns `false` when there is no such sender.
    async fn replace_track(&self, kind: TrackKind, track: &LocalTrack) -> Result<bool>;

    async fn create_offer(&self, ice_restart: bool) -> Result<String>;

    async fn create_answer(&self) -> Result<String>;

    async fn set_local_description(&self, kind: SdpType, sdp: String) -> Result<()>;

    async fn set_remote_description(&self, kind: SdpType, sdp: String) -> Result<()>;

    fn signaling_state(&self) -> SignalingState;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    /// Human readable description of the nominated candidate pair, if any.
    async fn selected_candidate_pair(&self) -> Option<String>;

    async fn close(&self) -> Result<()>;
}

/// Factory for peer connections.
#[async_trait]
pub trait RtcConnector: Send + Sync {
    async fn connect(
        &self,
        ice_servers: &[IceServerConfig],
        generation: u64,
        events: mpsc::Sender<ConnectionEvent>,
    ) -> Result<Arc<dyn RtcConnection>>;
}
