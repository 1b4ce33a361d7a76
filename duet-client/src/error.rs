use duet_core::RoomId;
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CallError>;

#[derive(Debug, Clone, Error)]
pub enum CallError {
    /// Camera or microphone denied or unavailable.
    #[error("media acquisition failed: {0}")]
    MediaAcquisition(String),

    #[error("signaling channel error: {0}")]
    SignalingChannel(String),

    #[error("negotiation failed: {0}")]
    Negotiation(String),

    #[error("ICE connectivity failed: {0}")]
    IceFailure(String),

    #[error("device switch failed: {0}")]
    DeviceSwitch(String),

    #[error("room {0} is full")]
    RoomFull(RoomId),

    #[error("call session has ended")]
    SessionEnded,
}

impl CallError {
    pub fn negotiation(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Negotiation(format!("{context}: {err}"))
    }

    /// Whether the error terminates the call.
    ///
    /// `SignalingChannel` is only produced once the channel exhausted its retries.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MediaAcquisition(_)
                | Self::SignalingChannel(_)
                | Self::RoomFull(_)
                | Self::SessionEnded
        )
    }

    pub fn alert(&self) -> Alert {
        let (severity, message) = match self {
            Self::MediaAcquisition(_) => (
                AlertSeverity::Fatal,
                "Could not access camera or microphone. Check permissions and try again.",
            ),
            Self::SignalingChannel(_) => (
                AlertSeverity::Fatal,
                "Lost connection to the call server. The call has ended.",
            ),
            Self::Negotiation(_) => (
                AlertSeverity::Warning,
                "Connection setup failed, retrying.",
            ),
            Self::IceFailure(_) => (
                AlertSeverity::Warning,
                "Connection lost, reconnecting.",
            ),
            Self::DeviceSwitch(_) => (
                AlertSeverity::Warning,
                "Could not change device. Keeping the previous one.",
            ),
            Self::RoomFull(_) => (
                AlertSeverity::Fatal,
                "This room already has two participants.",
            ),
            Self::SessionEnded => (AlertSeverity::Info, "The call has ended."),
        };
        Alert::new(severity, message)
    }
}

impl From<webrtc::Error> for CallError {
    fn from(err: webrtc::Error) -> Self {
        Self::Negotiation(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Fatal,
}

/// Actionable, user-facing notice. Never carries raw technical detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub message: String,
}

impl Alert {
    pub fn new(severity: AlertSeverity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(AlertSeverity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(AlertSeverity::Warning, message)
    }
}
