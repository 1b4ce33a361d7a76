use crate::error::Result;
use async_trait::async_trait;
use duet_core::{IceCandidate, PeerId};

/// Outbound half of signaling, as seen by the peer connection manager.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    async fn send_offer(&self, to: PeerId, sdp: String) -> Result<()>;

    async fn send_answer(&self, to: PeerId, sdp: String) -> Result<()>;

    async fn send_ice(&self, to: PeerId, candidate: IceCandidate) -> Result<()>;
}
