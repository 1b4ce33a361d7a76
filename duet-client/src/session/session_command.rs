use crate::error::{Alert, Result};
use crate::media::RemoteStream;
use duet_core::{DeviceList, EmotionEvent, TrackKind};
use tokio::sync::oneshot;

#[derive(Debug)]
pub enum SessionCommand {
    ReplaceDevice {
        kind: TrackKind,
        device_id: String,
        reply: oneshot::Sender<Result<()>>,
    },
    SetAudioOutput {
        device_id: String,
        reply: oneshot::Sender<bool>,
    },
    EnumerateDevices {
        reply: oneshot::Sender<Result<DeviceList>>,
    },
    End {
        reply: oneshot::Sender<()>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    LocalHangup,
    RemoteLeft,
    RoomFull,
    SignalingLost,
}

/// Notifications for the UI collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    RemoteStream(RemoteStream),
    Alert(Alert),
    Emotion(EmotionEvent),
    Ended(EndReason),
}
