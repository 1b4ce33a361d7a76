use crate::analytics::{AnalysisTarget, CallRecordStore, StreamAnalyzer};
use crate::config::CallConfig;
use crate::error::{Alert, CallError, Result};
use crate::ice::IceServerProvider;
use crate::media::{AudioOutput, MediaBackend, MediaDeviceManager, TrackPublisher};
use crate::peer::{ConnectionEvent, PeerConnectionManager, PeerUpdate, RtcConnector, WebRtcConnector};
use crate::reconnect::{ReconnectionSupervisor, RecoveryTick, SupervisorOutcome};
use crate::session::{CallHandle, EndReason, SessionCommand, SessionEvent};
use crate::signaling::{
    ChannelEvent, SignalingChannel, SignalingConnector, SignalingHandle, WsConnector,
};
use crate::status::ConnectionStatusAggregator;
use duet_core::utils::now_millis;
use duet_core::{
    CallAnalyticsRecord, ChannelStatus, EmotionEvent, MediaConstraints, PeerId, RoomId,
    SignalMessage, TrackKind,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Collaborators a call is built from.
pub struct CallDeps {
    pub media: Arc<dyn MediaBackend>,
    pub rtc: Arc<dyn RtcConnector>,
    pub signaling: Arc<dyn SignalingConnector>,
    pub audio_output: Option<Arc<dyn AudioOutput>>,
    pub analyzers: Vec<Arc<dyn StreamAnalyzer>>,
    pub record_store: Option<Arc<dyn CallRecordStore>>,
}

impl CallDeps {
    pub fn new(
        media: Arc<dyn MediaBackend>,
        rtc: Arc<dyn RtcConnector>,
        signaling: Arc<dyn SignalingConnector>,
    ) -> Self {
        Self {
            media,
            rtc,
            signaling,
            audio_output: None,
            analyzers: Vec::new(),
            record_store: None,
        }
    }

    /// Real WebRTC peer connections over a websocket signaling channel.
    pub fn webrtc(media: Arc<dyn MediaBackend>) -> Self {
        Self::new(media, Arc::new(WebRtcConnector), Arc::new(WsConnector))
    }

    pub fn with_audio_output(mut self, output: Arc<dyn AudioOutput>) -> Self {
        self.audio_output = Some(output);
        self
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn StreamAnalyzer>) -> Self {
        self.analyzers.push(analyzer);
        self
    }

    pub fn with_record_store(mut self, store: Arc<dyn CallRecordStore>) -> Self {
        self.record_store = Some(store);
        self
    }
}

struct Inboxes {
    commands: mpsc::Receiver<SessionCommand>,
    channel: mpsc::UnboundedReceiver<ChannelEvent>,
    connection: mpsc::Receiver<ConnectionEvent>,
    ticks: mpsc::UnboundedReceiver<RecoveryTick>,
    emotions: mpsc::Receiver<EmotionEvent>,
}

/// The single task that owns everything about one call.
///
/// Signaling messages, connection callbacks, recovery timers and handle commands all land
/// in this task's inboxes and are handled one at a time, in arrival order.
pub struct CallSession {
    session_id: Uuid,
    room_id: RoomId,
    local_peer: PeerId,
    remote_peer: Option<PeerId>,
    media: MediaDeviceManager,
    peers: PeerConnectionManager,
    supervisor: ReconnectionSupervisor,
    signaling: SignalingHandle,
    status: ConnectionStatusAggregator,
    audio_output: Option<Arc<dyn AudioOutput>>,
    analyzers: Vec<Arc<dyn StreamAnalyzer>>,
    record_store: Option<Arc<dyn CallRecordStore>>,
    record: CallAnalyticsRecord,
    emotion_tx: mpsc::Sender<EmotionEvent>,
    events: mpsc::UnboundedSender<SessionEvent>,
    rejoin_grace: Duration,
    rejoin_deadline: Option<Instant>,
    status_generation: Option<u64>,
    channel_outage: bool,
    torn_down: bool,
}

impl CallSession {
    /// Acquires media, connects signaling, joins `room_id` and spawns the session task.
    ///
    /// Fails without side effects when media cannot be acquired or the rendezvous server
    /// stays unreachable.
    pub async fn start(
        config: CallConfig,
        room_id: RoomId,
        deps: CallDeps,
    ) -> Result<(CallHandle, mpsc::UnboundedReceiver<SessionEvent>)> {
        let session_id = Uuid::new_v4();
        let local_peer = PeerId::new();
        info!(session = %session_id, peer = %local_peer, room = %room_id, "Starting call");

        let mut media = MediaDeviceManager::new(deps.media);
        media.enumerate_devices().await?;
        let constraints = MediaConstraints::from_selection(media.selection());
        let stream = media.acquire_stream(constraints).await?;

        let ice = IceServerProvider::new(config.ice.clone()).resolve().await;

        let (signaling, channel_rx) = match SignalingChannel::connect(
            &config.signaling_url,
            local_peer.clone(),
            deps.signaling,
            config.signaling_retry,
        )
        .await
        {
            Ok(connected) => connected,
            Err(e) => {
                media.stop_all();
                return Err(e);
            }
        };
        if let Err(e) = signaling.join_room(room_id.clone()) {
            media.stop_all();
            return Err(e);
        }

        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (conn_tx, conn_rx) = mpsc::channel(256);
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let (emotion_tx, emotion_rx) = mpsc::channel(256);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let status = ConnectionStatusAggregator::new();
        let handle = CallHandle::new(
            session_id,
            local_peer.clone(),
            room_id.clone(),
            cmd_tx,
            status.subscribe(),
        );

        let peers = PeerConnectionManager::new(
            local_peer.clone(),
            deps.rtc,
            Arc::new(signaling.clone()),
            ice.servers,
            conn_tx,
        );
        let supervisor = ReconnectionSupervisor::new(
            config.reconnect.disconnect_grace(),
            config.reconnect.retry_policy(),
            tick_tx,
        );

        for analyzer in &deps.analyzers {
            analyzer.attach(AnalysisTarget::Local(stream.clone()), emotion_tx.clone());
        }

        let session = Self {
            session_id,
            room_id: room_id.clone(),
            local_peer,
            remote_peer: None,
            media,
            peers,
            supervisor,
            signaling,
            status,
            audio_output: deps.audio_output,
            analyzers: deps.analyzers,
            record_store: deps.record_store,
            record: CallAnalyticsRecord::new(session_id, room_id, now_millis()),
            emotion_tx,
            events: event_tx,
            rejoin_grace: config.reconnect.rejoin_grace(),
            rejoin_deadline: None,
            status_generation: None,
            channel_outage: false,
            torn_down: false,
        };

        let inboxes = Inboxes {
            commands: cmd_rx,
            channel: channel_rx,
            connection: conn_rx,
            ticks: tick_rx,
            emotions: emotion_rx,
        };
        tokio::spawn(session.run(inboxes));

        Ok((handle, event_rx))
    }

    async fn run(mut self, mut inboxes: Inboxes) {
        info!(session = %self.session_id, "Call session loop started");
        let mut end_reply: Option<oneshot::Sender<()>> = None;

        let reason = loop {
            let deadline = self.rejoin_deadline;
            let rejoin_expired = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                cmd = inboxes.commands.recv() => match cmd {
                    Some(SessionCommand::End { reply }) => {
                        end_reply = Some(reply);
                        break EndReason::LocalHangup;
                    }
                    Some(cmd) => self.handle_command(cmd).await,
                    None => {
                        info!("All call handles dropped, hanging up");
                        break EndReason::LocalHangup;
                    }
                },

                evt = inboxes.channel.recv() => match evt {
                    Some(evt) => {
                        if let Some(reason) = self.handle_channel_event(evt).await {
                            break reason;
                        }
                    }
                    None => {
                        warn!("Signaling channel stopped unexpectedly");
                        break EndReason::SignalingLost;
                    }
                },

                Some(evt) = inboxes.connection.recv() => self.handle_connection_event(evt).await,

                Some(tick) = inboxes.ticks.recv() => self.handle_tick(tick).await,

                Some(emotion) = inboxes.emotions.recv() => self.handle_emotion(emotion),

                _ = rejoin_expired => {
                    info!("Remote peer did not rejoin in time");
                    break EndReason::RemoteLeft;
                }
            }

            self.sync_connection_status();
        };

        self.teardown(reason).await;
        if let Some(reply) = end_reply {
            let _ = reply.send(());
        }
        info!(session = %self.session_id, "Call session loop finished");
    }

    async fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::ReplaceDevice {
                kind,
                device_id,
                reply,
            } => {
                let publisher: Option<&dyn TrackPublisher> = if self.peers.has_active() {
                    Some(&self.peers)
                } else {
                    None
                };
                let result = match kind {
                    TrackKind::Video => self.media.replace_video_device(&device_id, publisher).await,
                    TrackKind::Audio => self.media.replace_audio_device(&device_id, publisher).await,
                };
                if let Err(e) = &result {
                    warn!("Device switch to {} failed: {}", device_id, e);
                    self.alert(e.alert());
                }
                let _ = reply.send(result);
            }
            SessionCommand::SetAudioOutput { device_id, reply } => {
                let applied = match &self.audio_output {
                    Some(output) => self.media.set_audio_output(&device_id, output.as_ref()),
                    None => {
                        warn!("No audio output attached, ignoring sink change");
                        false
                    }
                };
                let _ = reply.send(applied);
            }
            SessionCommand::EnumerateDevices { reply } => {
                let _ = reply.send(self.media.enumerate_devices().await);
            }
            SessionCommand::End { .. } => {}
        }
    }

    async fn handle_channel_event(&mut self, evt: ChannelEvent) -> Option<EndReason> {
        match evt {
            ChannelEvent::Status(status) => {
                self.status.set_channel(status);
                match status {
                    ChannelStatus::Error | ChannelStatus::Reconnecting if !self.channel_outage => {
                        self.channel_outage = true;
                        self.alert(Alert::warning("Connection to the server lost, reconnecting."));
                    }
                    ChannelStatus::Connected if self.channel_outage => {
                        self.channel_outage = false;
                        self.alert(Alert::info("Reconnected to the server."));
                    }
                    _ => {}
                }
                None
            }
            ChannelEvent::Exhausted { attempts } => {
                error!(attempts, "Signaling channel could not be restored");
                let err = CallError::SignalingChannel(format!("gave up after {} attempts", attempts));
                self.alert(err.alert());
                Some(EndReason::SignalingLost)
            }
            ChannelEvent::Message(message) => self.handle_signal(message).await,
        }
    }

    async fn handle_signal(&mut self, message: SignalMessage) -> Option<EndReason> {
        match message {
            SignalMessage::Welcome { peer_id } => {
                debug!(peer = %peer_id, "Server acknowledged connection");
            }
            SignalMessage::RoomUsers { users } => {
                let remote = users.into_iter().find(|u| *u != self.local_peer);
                match remote {
                    Some(remote) => {
                        info!(remote = %remote, "Room occupied, starting negotiation");
                        self.adopt_remote(remote.clone());
                        self.offer_to(remote).await;
                    }
                    None => info!(room = %self.room_id, "Room joined, waiting for a peer"),
                }
            }
            SignalMessage::UserJoined { peer_id } => {
                if peer_id != self.local_peer {
                    info!(remote = %peer_id, "Peer joined, waiting for their offer");
                    self.adopt_remote(peer_id);
                }
            }
            SignalMessage::UserLeft { user_id } => {
                if self.remote_peer.as_ref() == Some(&user_id) {
                    self.on_remote_left(user_id).await;
                }
            }
            SignalMessage::RoomFull => {
                let err = CallError::RoomFull(self.room_id.clone());
                warn!("{}", err);
                self.alert(err.alert());
                return Some(EndReason::RoomFull);
            }
            SignalMessage::Offer { sdp, to, from } => {
                if to != self.local_peer {
                    return None;
                }
                self.adopt_remote(from.clone());
                let Some(stream) = self.media.stream() else {
                    warn!("Offer received without local media, ignoring");
                    return None;
                };
                match self.peers.handle_offer(from, sdp, stream).await {
                    Ok(true) => self.supervisor.cancel_pending(),
                    Ok(false) => {}
                    Err(e) => self.on_negotiation_error(e).await,
                }
            }
            SignalMessage::Answer { sdp, to, from } => {
                if to != self.local_peer {
                    return None;
                }
                match self.peers.handle_answer(from, sdp).await {
                    Ok(true) => self.supervisor.cancel_pending(),
                    Ok(false) => {}
                    Err(e) => self.on_negotiation_error(e).await,
                }
            }
            SignalMessage::IceCandidate {
                candidate,
                to,
                from,
            } => {
                if to != self.local_peer {
                    return None;
                }
                if let Err(e) = self.peers.handle_ice_candidate(from, candidate).await {
                    debug!("Remote candidate rejected: {}", e);
                }
            }
            SignalMessage::JoinRoom { .. } | SignalMessage::LeaveRoom { .. } => {}
        }
        None
    }

    async fn handle_connection_event(&mut self, evt: ConnectionEvent) {
        let Some(update) = self.peers.handle_connection_event(evt).await else {
            return;
        };

        match &update {
            PeerUpdate::State(state) => self.status.set_peer(*state),
            PeerUpdate::Ice(state) => self.status.set_ice(*state),
            PeerUpdate::RemoteStream(stream) => {
                info!(stream = %stream.stream_id, tracks = stream.tracks.len(), "Remote media arrived");
                self.status.set_remote_media(true);
                for analyzer in &self.analyzers {
                    analyzer.attach(AnalysisTarget::Remote(stream.clone()), self.emotion_tx.clone());
                }
                let _ = self.events.send(SessionEvent::RemoteStream(stream.clone()));
            }
        }

        let outcome = self.supervisor.on_peer_update(&update, &mut self.peers).await;
        self.report(outcome);
    }

    async fn handle_tick(&mut self, tick: RecoveryTick) {
        let outcome = self
            .supervisor
            .on_tick(
                tick,
                &mut self.peers,
                self.remote_peer.as_ref(),
                self.media.stream(),
            )
            .await;
        self.report(outcome);
    }

    fn handle_emotion(&mut self, emotion: EmotionEvent) {
        self.record.push(emotion.clone());
        let _ = self.events.send(SessionEvent::Emotion(emotion));
    }

    fn adopt_remote(&mut self, remote: PeerId) {
        if self.remote_peer.as_ref() != Some(&remote) {
            self.supervisor.cancel();
        }
        self.remote_peer = Some(remote);
        if self.rejoin_deadline.take().is_some() {
            self.alert(Alert::info("The other participant is back."));
        }
    }

    async fn offer_to(&mut self, remote: PeerId) {
        let Some(stream) = self.media.stream() else {
            warn!("No local media to offer");
            return;
        };
        match self.peers.create_offer(remote, stream).await {
            Ok(()) => self.supervisor.cancel_pending(),
            Err(e) => self.on_negotiation_error(e).await,
        }
    }

    /// Keeps the peer axes about the current connection only.
    fn sync_connection_status(&mut self) {
        let current = self.peers.state().map(|s| s.generation);
        if current == self.status_generation {
            return;
        }
        self.status_generation = current;
        match current {
            Some(generation) => {
                debug!(generation, "New peer connection, resetting peer status");
                self.status.begin_connection();
            }
            None => self.status.set_remote_media(false),
        }
    }

    async fn on_remote_left(&mut self, remote: PeerId) {
        info!(remote = %remote, "Remote peer left the room");
        self.peers.close().await;
        self.supervisor.cancel();
        self.status.reset_peer();
        self.remote_peer = None;
        self.rejoin_deadline = Some(Instant::now() + self.rejoin_grace);
        self.alert(Alert::warning(
            "The other participant left. Waiting for them to rejoin.",
        ));
    }

    async fn on_negotiation_error(&mut self, err: CallError) {
        warn!("Negotiation error: {}", err);
        let outcome = self.supervisor.request_recovery(&mut self.peers).await;
        self.report(outcome);
    }

    fn report(&mut self, outcome: SupervisorOutcome) {
        match outcome {
            SupervisorOutcome::Idle | SupervisorOutcome::Armed => {}
            SupervisorOutcome::Scheduled { attempt } => {
                if attempt == 1 {
                    self.alert(Alert::warning("Connection lost, reconnecting."));
                }
            }
            SupervisorOutcome::Reoffered { attempt } => {
                debug!(attempt, "Recovery offer sent");
            }
            SupervisorOutcome::Skipped => {
                debug!("Recovery skipped");
            }
            SupervisorOutcome::GaveUp { attempts } => {
                warn!(attempts, "Peer connection could not be restored");
                self.alert(Alert::warning(
                    "Could not restore the connection. Waiting for the other participant.",
                ));
            }
        }
    }

    fn alert(&self, alert: Alert) {
        let _ = self.events.send(SessionEvent::Alert(alert));
    }

    /// Stops media, closes the peer, cancels timers and leaves signaling. Runs once.
    async fn teardown(&mut self, reason: EndReason) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        info!(session = %self.session_id, ?reason, "Tearing down call");

        self.media.stop_all();
        self.peers.close().await;
        self.supervisor.cancel();
        if reason != EndReason::SignalingLost {
            let _ = self.signaling.leave_room(self.room_id.clone());
        }
        self.signaling.disconnect();
        self.status.mark_ended();

        self.record.ended_at = now_millis();
        if let Some(store) = &self.record_store
            && let Err(e) = store.store(self.record.clone()).await
        {
            error!("Failed to persist call record: {:#}", e);
        }

        let _ = self.events.send(SessionEvent::Ended(reason));
    }
}
