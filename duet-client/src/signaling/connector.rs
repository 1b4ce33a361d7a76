use crate::error::{CallError, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// One live transport to the rendezvous server, as a pair of text-frame queues.
///
/// The transport is gone once `inbound` yields `None`; dropping `outbound` closes it.
pub struct SignalingLink {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
pub trait SignalingConnector: Send + Sync {
    async fn open(&self, url: &str) -> Result<SignalingLink>;
}

/// Websocket transport.
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

#[async_trait]
impl SignalingConnector for WsConnector {
    async fn open(&self, url: &str) -> Result<SignalingLink> {
        let (socket, _) = connect_async(url)
            .await
            .map_err(|e| CallError::SignalingChannel(format!("{}: {}", url, e)))?;
        debug!("Websocket connected to {}", url);

        let (mut sender, mut receiver) = socket.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if sender.send(Message::Text(text.into())).await.is_err() {
                    return;
                }
            }
            let _ = sender.send(Message::Close(None)).await;
        });

        tokio::spawn(async move {
            while let Some(frame) = receiver.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if in_tx.send(text.as_str().to_owned()).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Websocket read error: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(SignalingLink {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}
