use duet_client::peer::SignalingState;
use duet_core::PeerId;
use duet_client::peer::RtcConnection;

use crate::integration::{init_tracing, live_media, peer_fixture};
use crate::utils::MockRtcConnector;

const ANSWER: &str = "v=0\r\nm=audio 9 RTP 111\r\na=sendrecv\r\nm=video 9 RTP 96\r\na=sendrecv\r\n";

#[tokio::test]
async fn test_answer_in_stable_state_is_ignored() {
    init_tracing();

    let (_backend, _media, stream) = live_media().await;
    let mut fx = peer_fixture(PeerId::new(), MockRtcConnector::manual());
    let remote = PeerId::new();

    fx.manager.create_offer(remote.clone(), &stream).await.unwrap();
    assert!(fx.manager.handle_answer(remote.clone(), ANSWER.into()).await.unwrap());

    let connection = fx.connector.latest().unwrap();
    assert_eq!(connection.signaling_state(), SignalingState::Stable);

    // A late duplicate must neither fail nor touch the connection.
    assert!(!fx.manager.handle_answer(remote.clone(), ANSWER.into()).await.unwrap());
    assert_eq!(connection.signaling_state(), SignalingState::Stable);
    assert!(!connection.is_closed());
    assert_eq!(fx.connector.connections().len(), 1);
}

#[tokio::test]
async fn test_answer_from_unexpected_peer_is_ignored() {
    init_tracing();

    let (_backend, _media, stream) = live_media().await;
    let mut fx = peer_fixture(PeerId::new(), MockRtcConnector::manual());
    let remote = PeerId::new();

    fx.manager.create_offer(remote, &stream).await.unwrap();
    assert!(!fx.manager.handle_answer(PeerId::new(), ANSWER.into()).await.unwrap());

    let connection = fx.connector.latest().unwrap();
    assert_eq!(connection.signaling_state(), SignalingState::HaveLocalOffer);
}

#[tokio::test]
async fn test_answer_without_connection_is_ignored() {
    init_tracing();

    let mut fx = peer_fixture(PeerId::new(), MockRtcConnector::manual());

    assert!(!fx.manager.handle_answer(PeerId::new(), ANSWER.into()).await.unwrap());
    assert!(fx.connector.connections().is_empty());
}
