use duet_core::IceServerConfig;
use duet_server::ServerConfig;

use crate::integration::init_tracing;
use crate::utils::spawn_server;

fn config_with_key() -> ServerConfig {
    ServerConfig {
        ice_servers: vec![IceServerConfig {
            urls: vec!["turn:turn.example.org:3478".into()],
            username: Some("user".into()),
            credential: Some("pass".into()),
        }],
        api_key: Some("secret".into()),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_ice_endpoint_returns_servers_for_valid_key() {
    init_tracing();
    let addr = spawn_server(config_with_key()).await;

    let response = reqwest::get(format!("http://{}/api/ice-servers?apiKey=secret", addr))
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let servers: Vec<IceServerConfig> = response.json().await.unwrap();
    assert_eq!(servers, config_with_key().ice_servers);
}

#[tokio::test]
async fn test_ice_endpoint_rejects_wrong_key() {
    init_tracing();
    let addr = spawn_server(config_with_key()).await;

    let wrong = reqwest::get(format!("http://{}/api/ice-servers?apiKey=nope", addr))
        .await
        .unwrap();
    let missing = reqwest::get(format!("http://{}/api/ice-servers", addr))
        .await
        .unwrap();

    assert_eq!(wrong.status(), 401);
    assert_eq!(missing.status(), 401);
}

#[tokio::test]
async fn test_ice_endpoint_disabled_without_key() {
    init_tracing();
    let addr = spawn_server(ServerConfig::default()).await;

    let response = reqwest::get(format!("http://{}/api/ice-servers?apiKey=secret", addr))
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}
