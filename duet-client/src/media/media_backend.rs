use crate::error::Result;
use crate::media::{LocalTrack, MediaStream};
use async_trait::async_trait;
use duet_core::{MediaConstraints, MediaDeviceInfo, TrackKind};

/// Platform capture layer.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Lists devices. Labels are only filled in while a capture grant is live.
    async fn enumerate(&self) -> Result<Vec<MediaDeviceInfo>>;

    /// Opens the devices matching `constraints`.
    ///
    /// Errors with `CallError::MediaAcquisition` when access is denied or no device matches.
    async fn capture(&self, constraints: &MediaConstraints) -> Result<MediaStream>;
}

/// The "replace outbound track of kind K" operation of an active call.
#[async_trait]
pub trait TrackPublisher: Send + Sync {
    /// Returns `Ok(false)` when there is no outbound sender of that kind.
    async fn replace_outbound_track(&self, kind: TrackKind, track: &LocalTrack) -> Result<bool>;
}

/// Element that renders remote audio.
pub trait AudioOutput: Send + Sync {
    fn supports_sink_selection(&self) -> bool;

    fn set_sink(&self, device_id: &str) -> Result<()>;
}
