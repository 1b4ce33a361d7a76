use duet_core::SignalMessage;
use duet_server::ServerConfig;

use crate::integration::init_tracing;
use crate::utils::{TestClient, spawn_server};

#[tokio::test]
async fn test_two_peers_join() {
    init_tracing();
    let addr = spawn_server(ServerConfig::default()).await;

    let mut peer1 = TestClient::connect(addr).await.unwrap();
    peer1.join("room123").await.unwrap();
    assert_eq!(peer1.recv().await.unwrap(), SignalMessage::RoomUsers { users: vec![] });

    let mut peer2 = TestClient::connect(addr).await.unwrap();
    peer2.join("room123").await.unwrap();
    assert_eq!(
        peer2.recv().await.unwrap(),
        SignalMessage::RoomUsers {
            users: vec![peer1.peer_id.clone()]
        }
    );
    assert_eq!(
        peer1.recv().await.unwrap(),
        SignalMessage::UserJoined {
            peer_id: peer2.peer_id.clone()
        }
    );
}
