use crate::error::{CallError, Result};
use crate::media::{LocalTrack, MediaBackend, MediaStream};
use async_trait::async_trait;
use dashmap::DashMap;
use duet_core::{DeviceKind, MediaConstraints, MediaDeviceInfo, TrackConstraint, TrackKind};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use uuid::Uuid;

/// In-process capture backend producing silent tracks for headless participants.
pub struct SyntheticMediaBackend {
    devices: Vec<MediaDeviceInfo>,
    deny: AtomicBool,
    broken: DashMap<String, ()>,
    issued: DashMap<String, LocalTrack>,
}

impl SyntheticMediaBackend {
    pub fn new(devices: Vec<MediaDeviceInfo>) -> Self {
        Self {
            devices,
            deny: AtomicBool::new(false),
            broken: DashMap::new(),
            issued: DashMap::new(),
        }
    }

    /// Two cameras, two microphones and two speakers.
    pub fn with_default_devices() -> Self {
        let device = |id: &str, kind, label: &str| MediaDeviceInfo {
            device_id: id.to_owned(),
            kind,
            label: label.to_owned(),
        };
        Self::new(vec![
            device("cam-0", DeviceKind::VideoInput, "Integrated Camera"),
            device("cam-1", DeviceKind::VideoInput, "USB Camera"),
            device("mic-0", DeviceKind::AudioInput, "Built-in Microphone"),
            device("mic-1", DeviceKind::AudioInput, "Headset Microphone"),
            device("spk-0", DeviceKind::AudioOutput, "Built-in Speakers"),
            device("spk-1", DeviceKind::AudioOutput, "Headset"),
        ])
    }

    /// Makes every capture fail as if permission was denied.
    pub fn deny_capture(&self, deny: bool) {
        self.deny.store(deny, Ordering::Release);
    }

    /// Makes captures of one device fail as if it was unplugged.
    pub fn break_device(&self, device_id: &str) {
        self.broken.insert(device_id.to_owned(), ());
    }

    pub fn live_track_count(&self) -> usize {
        self.issued.iter().filter(|t| t.value().is_live()).count()
    }

    pub fn issued_tracks(&self) -> Vec<LocalTrack> {
        self.issued.iter().map(|t| t.value().clone()).collect()
    }

    fn resolve(&self, kind: TrackKind, constraint: &TrackConstraint) -> Result<Option<String>> {
        let device_kind = match kind {
            TrackKind::Video => DeviceKind::VideoInput,
            TrackKind::Audio => DeviceKind::AudioInput,
        };
        let mut candidates = self.devices.iter().filter(|d| d.kind == device_kind);

        let device = match constraint {
            TrackConstraint::Disabled => return Ok(None),
            TrackConstraint::Any => candidates.next(),
            TrackConstraint::Device(id) => candidates.find(|d| &d.device_id == id),
        };
        let Some(device) = device else {
            return Err(CallError::MediaAcquisition(format!(
                "no {:?} device matches {:?}",
                kind, constraint
            )));
        };
        if self.broken.contains_key(&device.device_id) {
            return Err(CallError::MediaAcquisition(format!(
                "device {} could not be started",
                device.device_id
            )));
        }
        Ok(Some(device.device_id.clone()))
    }
}

#[async_trait]
impl MediaBackend for SyntheticMediaBackend {
    async fn enumerate(&self) -> Result<Vec<MediaDeviceInfo>> {
        let granted = self.live_track_count() > 0;
        Ok(self
            .devices
            .iter()
            .map(|d| MediaDeviceInfo {
                label: if granted { d.label.clone() } else { String::new() },
                ..d.clone()
            })
            .collect())
    }

    async fn capture(&self, constraints: &MediaConstraints) -> Result<MediaStream> {
        if self.deny.load(Ordering::Acquire) {
            return Err(CallError::MediaAcquisition("permission denied".into()));
        }
        self.issued.retain(|_, track| track.is_live());

        let stream_id = Uuid::new_v4().to_string();
        let mut tracks = Vec::new();
        for kind in [TrackKind::Audio, TrackKind::Video] {
            if let Some(device_id) = self.resolve(kind, constraints.for_kind(kind))? {
                tracks.push(LocalTrack::new(kind, device_id, &stream_id));
            }
        }
        if tracks.is_empty() {
            return Err(CallError::MediaAcquisition(
                "constraints request no media".into(),
            ));
        }

        for track in &tracks {
            self.issued.insert(track.id().to_owned(), track.clone());
        }
        debug!(stream = %stream_id, tracks = tracks.len(), "Synthetic capture opened");
        Ok(MediaStream::new(stream_id, tracks))
    }
}
