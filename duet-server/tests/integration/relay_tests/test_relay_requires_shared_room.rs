use duet_core::SignalMessage;
use duet_server::ServerConfig;

use crate::integration::init_tracing;
use crate::utils::{TestClient, spawn_server};

#[tokio::test]
async fn test_relay_requires_shared_room() {
    init_tracing();
    let addr = spawn_server(ServerConfig::default()).await;

    let mut peer1 = TestClient::connect(addr).await.unwrap();
    let mut outsider = TestClient::connect(addr).await.unwrap();
    peer1.join("room123").await.unwrap();
    peer1.recv().await.unwrap();
    outsider.join("elsewhere").await.unwrap();
    outsider.recv().await.unwrap();

    outsider
        .send(&SignalMessage::Answer {
            sdp: "v=0".into(),
            to: peer1.peer_id.clone(),
            from: outsider.peer_id.clone(),
        })
        .await
        .unwrap();

    assert!(peer1.is_silent_for(300).await);
}
