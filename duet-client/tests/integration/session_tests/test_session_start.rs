use duet_client::error::{AlertSeverity, CallError};
use duet_client::media::SyntheticMediaBackend;
use duet_client::{CallDeps, CallSession, EndReason, SessionEvent};
use duet_core::{ChannelStatus, OverallStatus, RoomId, SignalMessage};
use std::sync::Arc;

use super::{ROOM, SessionFixture, test_config, wait_for_overall};
use crate::integration::init_tracing;
use crate::utils::{MockRtcConnector, MockSignalingConnector};

#[tokio::test]
async fn test_joins_room_and_waits_for_peer() {
    init_tracing();

    let fx = SessionFixture::start().await;

    wait_for_overall(&fx.handle, OverallStatus::WaitingForPeer).await;
    let status = fx.handle.status();
    assert_eq!(status.signaling_channel, ChannelStatus::Connected);
    assert!(!status.remote_media);
    assert_eq!(fx.handle.room_id(), &RoomId::from(ROOM));
    assert!(fx.rtc.connections().is_empty(), "nobody to call yet");
    assert_eq!(fx.backend.live_track_count(), 2);
}

#[tokio::test]
async fn test_denied_media_fails_before_signaling() {
    init_tracing();

    let backend = Arc::new(SyntheticMediaBackend::with_default_devices());
    backend.deny_capture(true);
    let rtc = MockRtcConnector::new();
    let (signaling, _servers) = MockSignalingConnector::new();
    let deps = CallDeps::new(
        backend.clone(),
        Arc::new(rtc.clone()),
        Arc::new(signaling.clone()),
    );

    let result = CallSession::start(test_config(), RoomId::from(ROOM), deps).await;

    assert!(matches!(result, Err(CallError::MediaAcquisition(_))));
    assert!(result.err().is_some_and(|e| e.is_fatal()));
    assert_eq!(signaling.attempts(), 0);
    assert!(rtc.connections().is_empty());
    assert_eq!(backend.live_track_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_server_releases_media() {
    init_tracing();

    let backend = Arc::new(SyntheticMediaBackend::with_default_devices());
    let (signaling, _servers) = MockSignalingConnector::new();
    signaling.fail_next(u32::MAX);
    let deps = CallDeps::new(
        backend.clone(),
        Arc::new(MockRtcConnector::new()),
        Arc::new(signaling),
    );

    let result = CallSession::start(test_config(), RoomId::from(ROOM), deps).await;

    assert!(matches!(result, Err(CallError::SignalingChannel(_))));
    assert_eq!(backend.live_track_count(), 0);
}

#[tokio::test]
async fn test_room_full_ends_call() {
    init_tracing();

    let mut fx = SessionFixture::start().await;
    fx.server.send(SignalMessage::RoomFull);

    let alert = fx
        .next_event(|e| matches!(e, SessionEvent::Alert(_)))
        .await;
    let SessionEvent::Alert(alert) = alert else {
        unreachable!()
    };
    assert_eq!(alert.severity, AlertSeverity::Fatal);

    assert_eq!(
        fx.next_event(|e| matches!(e, SessionEvent::Ended(_))).await,
        SessionEvent::Ended(EndReason::RoomFull)
    );
    assert_eq!(fx.handle.status().overall, OverallStatus::Ended);
    assert_eq!(fx.backend.live_track_count(), 0);
}
