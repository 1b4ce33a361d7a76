mod test_disconnect_grace;
mod test_failure_recovery;
mod test_recovery_limits;

use duet_client::media::{MediaDeviceManager, MediaStream, SyntheticMediaBackend};
use duet_client::peer::RtcEvent;
use duet_client::reconnect::{RecoveryTick, ReconnectionSupervisor, SupervisorOutcome};
use duet_client::retry::RetryPolicy;
use duet_core::{PeerId, PeerState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::integration::{PeerFixture, live_media, peer_fixture};
use crate::utils::{MockRtcConnection, MockRtcConnector};

pub const GRACE: Duration = Duration::from_secs(5);
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// A negotiated call under supervision, driven by hand the way the session task drives it.
pub struct RecoveryHarness {
    pub peer: PeerFixture,
    pub supervisor: ReconnectionSupervisor,
    pub ticks: mpsc::UnboundedReceiver<RecoveryTick>,
    pub remote: PeerId,
    pub stream: MediaStream,
    pub backend: Arc<SyntheticMediaBackend>,
    pub media: MediaDeviceManager,
}

impl RecoveryHarness {
    pub async fn connected(max_attempts: u32) -> Self {
        let (backend, media, stream) = live_media().await;
        let mut peer = peer_fixture(PeerId::new(), MockRtcConnector::manual());
        let remote = PeerId::new();
        let (tick_tx, ticks) = mpsc::unbounded_channel();
        let supervisor = ReconnectionSupervisor::new(
            GRACE,
            RetryPolicy::fixed(max_attempts, RETRY_DELAY),
            tick_tx,
        );

        peer.manager.create_offer(remote.clone(), &stream).await.unwrap();
        peer.manager
            .handle_answer(remote.clone(), "v=0\r\nm=audio 9 RTP 111\r\n".into())
            .await
            .unwrap();

        let mut harness = Self {
            peer,
            supervisor,
            ticks,
            remote,
            stream,
            backend,
            media,
        };
        let outcome = harness.state(PeerState::Connected).await;
        assert_eq!(outcome, SupervisorOutcome::Idle);
        harness
    }

    pub fn connection(&self) -> Arc<MockRtcConnection> {
        self.peer.connector.latest().unwrap()
    }

    /// Reports a state change on the current connection and lets the supervisor react.
    pub async fn state(&mut self, state: PeerState) -> SupervisorOutcome {
        self.connection().emit(RtcEvent::StateChanged(state)).await;
        let event = self.peer.events.recv().await.unwrap();
        let update = self
            .peer
            .manager
            .handle_connection_event(event)
            .await
            .expect("event from the current connection");
        self.supervisor
            .on_peer_update(&update, &mut self.peer.manager)
            .await
    }

    pub async fn next_tick(&mut self) -> SupervisorOutcome {
        let tick = self.ticks.recv().await.unwrap();
        self.supervisor
            .on_tick(
                tick,
                &mut self.peer.manager,
                Some(&self.remote),
                Some(&self.stream),
            )
            .await
    }

    /// Whether a timer fires within the next minute.
    pub async fn has_pending_tick(&mut self) -> bool {
        tokio::time::timeout(Duration::from_secs(60), self.ticks.recv())
            .await
            .is_ok()
    }
}
