mod test_call_analytics;
mod test_session_start;

use duet_client::media::SyntheticMediaBackend;
use duet_client::{CallConfig, CallDeps, CallHandle, CallSession, SessionEvent};
use duet_core::{OverallStatus, PeerId, RoomId, SignalMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::utils::{MockRtcConnector, MockSignalingConnector, ServerSide, accept};

pub const ROOM: &str = "room123";

/// Answer SDP announcing audio and video from the remote side.
pub const REMOTE_ANSWER: &str = "v=0\r\no=remote 1 0 IN IP4 127.0.0.1\r\ns=answer\r\nm=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=sendrecv\r\nm=video 9 UDP/TLS/RTP/SAVPF 96\r\na=sendrecv\r\n";

pub fn test_config() -> CallConfig {
    CallConfig {
        signaling_url: "ws://duet.test/ws".into(),
        ..Default::default()
    }
}

/// A running call whose rendezvous server is played by the test.
pub struct SessionFixture {
    pub handle: CallHandle,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    pub server: ServerSide,
    pub servers: mpsc::UnboundedReceiver<ServerSide>,
    pub rtc: MockRtcConnector,
    pub signaling: MockSignalingConnector,
    pub backend: Arc<SyntheticMediaBackend>,
}

impl SessionFixture {
    pub async fn start() -> Self {
        Self::start_with(test_config(), |deps| deps).await
    }

    pub async fn start_with(
        config: CallConfig,
        customize: impl FnOnce(CallDeps) -> CallDeps,
    ) -> Self {
        let backend = Arc::new(SyntheticMediaBackend::with_default_devices());
        let rtc = MockRtcConnector::new();
        let (signaling, mut servers) = MockSignalingConnector::new();
        let deps = customize(CallDeps::new(
            backend.clone(),
            Arc::new(rtc.clone()),
            Arc::new(signaling.clone()),
        ));

        let (handle, events) = CallSession::start(config, RoomId::from(ROOM), deps)
            .await
            .expect("call should start");

        let mut server = accept(&mut servers).await;
        assert_eq!(
            server.recv().await,
            SignalMessage::JoinRoom {
                room_id: RoomId::from(ROOM)
            }
        );

        Self {
            handle,
            events,
            server,
            servers,
            rtc,
            signaling,
            backend,
        }
    }

    /// Announces a remote participant already in the room and completes negotiation with it.
    pub async fn connect_remote(&mut self) -> PeerId {
        let remote = PeerId::new();
        self.server.send(SignalMessage::RoomUsers {
            users: vec![remote.clone()],
        });

        let offer = self
            .server
            .recv_matching(|m| matches!(m, SignalMessage::Offer { .. }))
            .await;
        let SignalMessage::Offer { to, from, .. } = offer else {
            unreachable!()
        };
        assert_eq!(to, remote);
        assert_eq!(&from, self.handle.local_peer());

        self.server.send(SignalMessage::Answer {
            sdp: REMOTE_ANSWER.into(),
            to: from,
            from: remote.clone(),
        });
        wait_for_overall(&self.handle, OverallStatus::Connected).await;
        remote
    }

    /// Next session event matching `accept`, skipping others.
    pub async fn next_event(&mut self, accept: impl Fn(&SessionEvent) -> bool) -> SessionEvent {
        next_event(&mut self.events, accept).await
    }
}

pub async fn next_event(
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    accept: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(60), events.recv())
            .await
            .expect("timed out waiting for a session event")
            .expect("session event stream closed");
        if accept(&event) {
            return event;
        }
    }
}

pub async fn wait_for_overall(handle: &CallHandle, overall: OverallStatus) {
    let mut status = handle.watch_status();
    tokio::time::timeout(Duration::from_secs(10), status.wait_for(|s| s.overall == overall))
        .await
        .unwrap_or_else(|_| panic!("status never became {:?}", overall))
        .expect("status publisher dropped");
}
