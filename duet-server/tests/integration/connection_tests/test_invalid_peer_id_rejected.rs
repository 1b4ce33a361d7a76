use duet_server::ServerConfig;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Error;

use crate::integration::init_tracing;
use crate::utils::spawn_server;

#[tokio::test]
async fn test_invalid_peer_id_rejected() {
    init_tracing();
    let addr = spawn_server(ServerConfig::default()).await;

    let result = connect_async(format!("ws://{}/ws/not-a-uuid", addr)).await;

    match result {
        Err(Error::Http(response)) => assert_eq!(response.status(), 400),
        other => panic!("Expected HTTP 400, got {:?}", other.map(|_| ())),
    }
}
