mod config;
mod room;
mod signaling;

pub use config::*;
pub use room::*;
pub use signaling::*;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tracing::info;

pub fn router(service: SignalingService) -> Router {
    Router::new()
        .route("/ws/{peer_id}", get(ws_handler))
        .route("/api/ice-servers", get(ice_servers_handler))
        .with_state(service)
}

/// Serves the rendezvous endpoints on an already bound listener until the task is dropped.
pub async fn serve(listener: TcpListener, config: ServerConfig) -> Result<()> {
    let addr = listener
        .local_addr()
        .context("Failed to read listener address")?;
    let service = SignalingService::new(config);

    info!("Rendezvous server listening on {}", addr);
    axum::serve(listener, router(service))
        .await
        .context("Rendezvous server stopped")?;
    Ok(())
}
