use duet_core::{IceState, PeerId, PeerState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationRole {
    Offerer,
    Answerer,
}

/// Snapshot of the single peer connection of a call.
///
/// Candidate counters and the selected pair are telemetry; nothing branches on them.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerConnectionState {
    pub generation: u64,
    pub remote_peer: PeerId,
    pub role: NegotiationRole,
    pub connection_state: PeerState,
    pub ice_connection_state: IceState,
    pub local_description: Option<String>,
    pub remote_description: Option<String>,
    pub local_candidates: usize,
    pub remote_candidates: usize,
    pub selected_candidate_pair: Option<String>,
    pub remote_stream_published: bool,
}

impl PeerConnectionState {
    pub fn new(generation: u64, remote_peer: PeerId, role: NegotiationRole) -> Self {
        Self {
            generation,
            remote_peer,
            role,
            connection_state: PeerState::New,
            ice_connection_state: IceState::New,
            local_description: None,
            remote_description: None,
            local_candidates: 0,
            remote_candidates: 0,
            selected_candidate_pair: None,
            remote_stream_published: false,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.connection_state == PeerState::Connected || self.ice_connection_state.is_established()
    }
}
