use crate::error::{CallError, Result};
use crate::retry::RetryPolicy;
use crate::signaling::{SignalingConnector, SignalingLink, SignalingOutput};
use async_trait::async_trait;
use duet_core::{ChannelStatus, IceCandidate, PeerId, RoomId, SignalKind, SignalMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub enum ChannelCommand {
    JoinRoom(RoomId),
    LeaveRoom(RoomId),
    Send(SignalMessage),
    Disconnect,
}

/// What the channel reports to its owner, in delivery order.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Status(ChannelStatus),
    Message(SignalMessage),
    /// Reconnection gave up; the channel task has stopped.
    Exhausted { attempts: u32 },
}

enum PumpExit {
    Disconnect,
    Dropped,
}

enum Reconnect {
    Restored(SignalingLink),
    Cancelled,
    Exhausted { attempts: u32 },
}

/// Persistent channel to the rendezvous server.
///
/// Owns the transport and its reconnection. After a reconnect the room that was active is
/// joined again, so the remote side sees the membership re-announced.
pub struct SignalingChannel {
    url: String,
    connector: Arc<dyn SignalingConnector>,
    retry: RetryPolicy,
    commands: mpsc::UnboundedReceiver<ChannelCommand>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    subscribers: broadcast::Sender<SignalMessage>,
    room: Option<RoomId>,
}

impl SignalingChannel {
    /// Connects to `<base_url>/<local_peer>` and spawns the channel task.
    ///
    /// The first connection uses the same retry budget as later reconnects; running out of
    /// it here is reported as an error instead of an [`ChannelEvent::Exhausted`].
    pub async fn connect(
        base_url: &str,
        local_peer: PeerId,
        connector: Arc<dyn SignalingConnector>,
        retry: RetryPolicy,
    ) -> Result<(SignalingHandle, mpsc::UnboundedReceiver<ChannelEvent>)> {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (subscribers, _) = broadcast::channel(64);

        let mut channel = Self {
            url: format!("{}/{}", base_url.trim_end_matches('/'), local_peer),
            connector,
            retry,
            commands: cmd_rx,
            events: event_tx,
            subscribers: subscribers.clone(),
            room: None,
        };

        channel.emit_status(ChannelStatus::Connecting);
        let link = match channel.connector.open(&channel.url).await {
            Ok(link) => link,
            Err(e) => {
                warn!("Initial signaling connection failed: {}", e);
                channel.emit_status(ChannelStatus::Error);
                match channel.reconnect().await {
                    Reconnect::Restored(link) => link,
                    Reconnect::Cancelled => {
                        return Err(CallError::SignalingChannel("connection cancelled".into()));
                    }
                    Reconnect::Exhausted { attempts } => {
                        return Err(CallError::SignalingChannel(format!(
                            "could not reach {} after {} attempts",
                            channel.url, attempts
                        )));
                    }
                }
            }
        };
        channel.emit_status(ChannelStatus::Connected);
        info!(peer = %local_peer, "Signaling channel connected");

        tokio::spawn(channel.run(link));

        let handle = SignalingHandle {
            local_peer,
            commands: cmd_tx,
            subscribers,
        };
        Ok((handle, event_rx))
    }

    async fn run(mut self, mut link: SignalingLink) {
        loop {
            match self.pump(&mut link).await {
                PumpExit::Disconnect => break,
                PumpExit::Dropped => {
                    warn!("Signaling transport dropped, reconnecting");
                    self.emit_status(ChannelStatus::Error);
                    match self.reconnect().await {
                        Reconnect::Restored(fresh) => {
                            link = fresh;
                            self.emit_status(ChannelStatus::Connected);
                            if let Some(room) = self.room.clone() {
                                info!(room = %room, "Re-joining room after reconnect");
                                Self::write(&link, &SignalMessage::JoinRoom { room_id: room });
                            }
                        }
                        Reconnect::Cancelled => {
                            debug!("Disconnect requested while reconnecting");
                            break;
                        }
                        Reconnect::Exhausted { attempts } => {
                            error!(attempts, "Signaling reconnection exhausted");
                            let _ = self.events.send(ChannelEvent::Exhausted { attempts });
                            return;
                        }
                    }
                }
            }
        }

        self.emit_status(ChannelStatus::Disconnected);
        info!("Signaling channel closed");
    }

    async fn pump(&mut self, link: &mut SignalingLink) -> PumpExit {
        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    None | Some(ChannelCommand::Disconnect) => return PumpExit::Disconnect,
                    Some(ChannelCommand::JoinRoom(room_id)) => {
                        self.room = Some(room_id.clone());
                        Self::write(link, &SignalMessage::JoinRoom { room_id });
                    }
                    Some(ChannelCommand::LeaveRoom(room_id)) => {
                        if self.room.as_ref() == Some(&room_id) {
                            self.room = None;
                        }
                        Self::write(link, &SignalMessage::LeaveRoom { room_id });
                    }
                    Some(ChannelCommand::Send(message)) => Self::write(link, &message),
                },

                frame = link.inbound.recv() => match frame {
                    Some(text) => match serde_json::from_str::<SignalMessage>(&text) {
                        Ok(message) => self.deliver(message),
                        Err(e) => warn!("Invalid signal message from server: {}", e),
                    },
                    None => return PumpExit::Dropped,
                },
            }
        }
    }

    /// Retries the transport per policy.
    async fn reconnect(&mut self) -> Reconnect {
        let mut retry = self.retry.start();
        loop {
            let Some(delay) = retry.next_delay() else {
                self.emit_status(ChannelStatus::Error);
                return Reconnect::Exhausted {
                    attempts: retry.attempts(),
                };
            };
            if self.wait_or_disconnect(delay).await {
                return Reconnect::Cancelled;
            }

            self.emit_status(ChannelStatus::Reconnecting);
            match self.connector.open(&self.url).await {
                Ok(link) => {
                    info!(attempt = retry.attempts(), "Signaling transport restored");
                    return Reconnect::Restored(link);
                }
                Err(e) => {
                    warn!(attempt = retry.attempts(), "Signaling reconnect failed: {}", e);
                    self.emit_status(ChannelStatus::Error);
                }
            }
        }
    }

    /// Sleeps through a backoff delay while still honouring commands.
    /// Returns `true` when the owner asked to disconnect.
    async fn wait_or_disconnect(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return false,
                cmd = self.commands.recv() => match cmd {
                    None | Some(ChannelCommand::Disconnect) => return true,
                    Some(ChannelCommand::JoinRoom(room_id)) => self.room = Some(room_id),
                    Some(ChannelCommand::LeaveRoom(room_id)) => {
                        if self.room.as_ref() == Some(&room_id) {
                            self.room = None;
                        }
                    }
                    Some(ChannelCommand::Send(message)) => {
                        debug!(kind = ?message.kind(), "Dropping message while disconnected");
                    }
                },
            }
        }
    }

    fn deliver(&self, message: SignalMessage) {
        let _ = self.subscribers.send(message.clone());
        let _ = self.events.send(ChannelEvent::Message(message));
    }

    fn emit_status(&self, status: ChannelStatus) {
        let _ = self.events.send(ChannelEvent::Status(status));
    }

    fn write(link: &SignalingLink, message: &SignalMessage) {
        match serde_json::to_string(message) {
            Ok(json) => {
                if link.outbound.send(json).is_err() {
                    warn!(kind = ?message.kind(), "Signaling transport closed, message dropped");
                }
            }
            Err(e) => error!("Failed to serialize signal message: {}", e),
        }
    }
}

/// Cloneable front of a running [`SignalingChannel`].
#[derive(Clone)]
pub struct SignalingHandle {
    local_peer: PeerId,
    commands: mpsc::UnboundedSender<ChannelCommand>,
    subscribers: broadcast::Sender<SignalMessage>,
}

impl SignalingHandle {
    pub fn local_peer(&self) -> &PeerId {
        &self.local_peer
    }

    pub fn join_room(&self, room_id: RoomId) -> Result<()> {
        self.command(ChannelCommand::JoinRoom(room_id))
    }

    pub fn leave_room(&self, room_id: RoomId) -> Result<()> {
        self.command(ChannelCommand::LeaveRoom(room_id))
    }

    pub fn send(&self, message: SignalMessage) -> Result<()> {
        self.command(ChannelCommand::Send(message))
    }

    /// Stops the channel task. Safe to call more than once.
    pub fn disconnect(&self) {
        let _ = self.commands.send(ChannelCommand::Disconnect);
    }

    /// Incoming messages of the given kinds, from now on.
    pub fn subscribe(&self, kinds: &[SignalKind]) -> Subscription {
        Subscription {
            receiver: self.subscribers.subscribe(),
            kinds: kinds.to_vec(),
        }
    }

    fn command(&self, command: ChannelCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| CallError::SignalingChannel("signaling channel is closed".into()))
    }
}

#[async_trait]
impl SignalingOutput for SignalingHandle {
    async fn send_offer(&self, to: PeerId, sdp: String) -> Result<()> {
        self.send(SignalMessage::Offer {
            sdp,
            to,
            from: self.local_peer.clone(),
        })
    }

    async fn send_answer(&self, to: PeerId, sdp: String) -> Result<()> {
        self.send(SignalMessage::Answer {
            sdp,
            to,
            from: self.local_peer.clone(),
        })
    }

    async fn send_ice(&self, to: PeerId, candidate: IceCandidate) -> Result<()> {
        self.send(SignalMessage::IceCandidate {
            candidate,
            to,
            from: self.local_peer.clone(),
        })
    }
}

pub struct Subscription {
    receiver: broadcast::Receiver<SignalMessage>,
    kinds: Vec<SignalKind>,
}

impl Subscription {
    /// Next matching message, or `None` once the channel is gone.
    pub async fn recv(&mut self) -> Option<SignalMessage> {
        loop {
            match self.receiver.recv().await {
                Ok(message) if self.kinds.contains(&message.kind()) => return Some(message),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Signal subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
