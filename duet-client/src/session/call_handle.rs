use crate::error::{CallError, Result};
use crate::session::SessionCommand;
use duet_core::{ConnectionStatus, DeviceList, PeerId, RoomId, TrackKind};
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

/// Control surface of a running call. Dropping every handle hangs up.
#[derive(Clone)]
pub struct CallHandle {
    session_id: Uuid,
    local_peer: PeerId,
    room_id: RoomId,
    commands: mpsc::Sender<SessionCommand>,
    status: watch::Receiver<ConnectionStatus>,
}

impl CallHandle {
    pub(crate) fn new(
        session_id: Uuid,
        local_peer: PeerId,
        room_id: RoomId,
        commands: mpsc::Sender<SessionCommand>,
        status: watch::Receiver<ConnectionStatus>,
    ) -> Self {
        Self {
            session_id,
            local_peer,
            room_id,
            commands,
            status,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn local_peer(&self) -> &PeerId {
        &self.local_peer
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Ends the call and waits for teardown. Idempotent.
    pub async fn end(&self) {
        let (reply, done) = oneshot::channel();
        if self.commands.send(SessionCommand::End { reply }).await.is_ok() {
            let _ = done.await;
        }
    }

    pub async fn replace_video_device(&self, device_id: impl Into<String>) -> Result<()> {
        self.replace_device(TrackKind::Video, device_id.into()).await
    }

    pub async fn replace_audio_device(&self, device_id: impl Into<String>) -> Result<()> {
        self.replace_device(TrackKind::Audio, device_id.into()).await
    }

    /// Best effort; `Ok(false)` when the sink could not be applied.
    pub async fn set_audio_output(&self, device_id: impl Into<String>) -> Result<bool> {
        let device_id = device_id.into();
        self.request(|reply| SessionCommand::SetAudioOutput { device_id, reply })
            .await
    }

    pub async fn enumerate_devices(&self) -> Result<DeviceList> {
        self.request(|reply| SessionCommand::EnumerateDevices { reply })
            .await?
    }

    async fn replace_device(&self, kind: TrackKind, device_id: String) -> Result<()> {
        self.request(|reply| SessionCommand::ReplaceDevice {
            kind,
            device_id,
            reply,
        })
        .await?
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| CallError::SessionEnded)?;
        response.await.map_err(|_| CallError::SessionEnded)
    }
}
