use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    VideoInput,
    AudioInput,
    AudioOutput,
}

impl DeviceKind {
    pub fn track_kind(self) -> Option<TrackKind> {
        match self {
            Self::VideoInput => Some(TrackKind::Video),
            Self::AudioInput => Some(TrackKind::Audio),
            Self::AudioOutput => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDeviceInfo {
    pub device_id: String,
    pub kind: DeviceKind,
    /// Empty unless a capture grant was live during enumeration.
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceList {
    pub video_inputs: Vec<MediaDeviceInfo>,
    pub audio_inputs: Vec<MediaDeviceInfo>,
    pub audio_outputs: Vec<MediaDeviceInfo>,
}

impl DeviceList {
    pub fn from_devices(devices: impl IntoIterator<Item = MediaDeviceInfo>) -> Self {
        let mut list = Self::default();
        for device in devices {
            match device.kind {
                DeviceKind::VideoInput => list.video_inputs.push(device),
                DeviceKind::AudioInput => list.audio_inputs.push(device),
                DeviceKind::AudioOutput => list.audio_outputs.push(device),
            }
        }
        list
    }

    pub fn of_kind(&self, kind: DeviceKind) -> &[MediaDeviceInfo] {
        match kind {
            DeviceKind::VideoInput => &self.video_inputs,
            DeviceKind::AudioInput => &self.audio_inputs,
            DeviceKind::AudioOutput => &self.audio_outputs,
        }
    }

    pub fn contains(&self, kind: DeviceKind, device_id: &str) -> bool {
        self.of_kind(kind).iter().any(|d| d.device_id == device_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSelection {
    pub video_device_id: Option<String>,
    pub audio_device_id: Option<String>,
    pub audio_output_device_id: Option<String>,
}

impl DeviceSelection {
    pub fn get(&self, kind: DeviceKind) -> Option<&str> {
        match kind {
            DeviceKind::VideoInput => self.video_device_id.as_deref(),
            DeviceKind::AudioInput => self.audio_device_id.as_deref(),
            DeviceKind::AudioOutput => self.audio_output_device_id.as_deref(),
        }
    }

    pub fn set(&mut self, kind: DeviceKind, device_id: Option<String>) {
        match kind {
            DeviceKind::VideoInput => self.video_device_id = device_id,
            DeviceKind::AudioInput => self.audio_device_id = device_id,
            DeviceKind::AudioOutput => self.audio_output_device_id = device_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackConstraint {
    Disabled,
    #[default]
    Any,
    Device(String),
}

impl TrackConstraint {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConstraints {
    pub video: TrackConstraint,
    pub audio: TrackConstraint,
}

impl MediaConstraints {
    /// Constraints matching the current selection; unselected kinds accept any device.
    pub fn from_selection(selection: &DeviceSelection) -> Self {
        let pick = |id: Option<&String>| match id {
            Some(id) => TrackConstraint::Device(id.clone()),
            None => TrackConstraint::Any,
        };
        Self {
            video: pick(selection.video_device_id.as_ref()),
            audio: pick(selection.audio_device_id.as_ref()),
        }
    }

    /// Constraints that capture only `kind` from `device_id`.
    pub fn only(kind: TrackKind, device_id: &str) -> Self {
        let device = TrackConstraint::Device(device_id.to_owned());
        match kind {
            TrackKind::Video => Self {
                video: device,
                audio: TrackConstraint::Disabled,
            },
            TrackKind::Audio => Self {
                video: TrackConstraint::Disabled,
                audio: device,
            },
        }
    }

    pub fn for_kind(&self, kind: TrackKind) -> &TrackConstraint {
        match kind {
            TrackKind::Video => &self.video,
            TrackKind::Audio => &self.audio,
        }
    }
}
