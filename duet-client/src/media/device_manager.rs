use crate::error::{CallError, Result};
use crate::media::{AudioOutput, MediaBackend, MediaStream, TrackPublisher};
use duet_core::{DeviceKind, DeviceList, DeviceSelection, MediaConstraints, TrackKind};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Owns device selection and the local media stream of a call.
pub struct MediaDeviceManager {
    backend: Arc<dyn MediaBackend>,
    devices: DeviceList,
    selection: DeviceSelection,
    stream: Option<MediaStream>,
}

impl MediaDeviceManager {
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        Self {
            backend,
            devices: DeviceList::default(),
            selection: DeviceSelection::default(),
            stream: None,
        }
    }

    pub fn devices(&self) -> &DeviceList {
        &self.devices
    }

    pub fn selection(&self) -> &DeviceSelection {
        &self.selection
    }

    pub fn stream(&self) -> Option<&MediaStream> {
        self.stream.as_ref()
    }

    /// Enumerates devices with labels.
    ///
    /// Labels require a capture grant, so when no stream is live a short-lived one is
    /// opened for the duration of the enumeration and released right after.
    pub async fn enumerate_devices(&mut self) -> Result<DeviceList> {
        let grant = if self.stream.as_ref().is_some_and(MediaStream::is_live) {
            None
        } else {
            match self.backend.capture(&MediaConstraints::default()).await {
                Ok(grant) => Some(grant),
                Err(e) => {
                    warn!("Enumerating without device labels: {}", e);
                    None
                }
            }
        };

        let devices = self.backend.enumerate().await;
        if let Some(grant) = grant {
            grant.stop_all();
        }

        self.devices = DeviceList::from_devices(devices?);
        self.reconcile_selection();
        debug!(
            video = self.devices.video_inputs.len(),
            audio = self.devices.audio_inputs.len(),
            outputs = self.devices.audio_outputs.len(),
            "Enumerated media devices"
        );
        Ok(self.devices.clone())
    }

    /// Acquires a new local stream, replacing (and stopping) the current one.
    pub async fn acquire_stream(&mut self, constraints: MediaConstraints) -> Result<MediaStream> {
        let stream = self.backend.capture(&constraints).await?;

        if let Some(old) = self.stream.replace(stream.clone()) {
            old.stop_all();
        }
        for track in stream.tracks() {
            let kind = match track.kind() {
                TrackKind::Video => DeviceKind::VideoInput,
                TrackKind::Audio => DeviceKind::AudioInput,
            };
            self.selection.set(kind, Some(track.device_id().to_owned()));
        }

        info!(
            stream = stream.id(),
            tracks = stream.tracks().len(),
            "Acquired local media stream"
        );
        Ok(stream)
    }

    pub async fn replace_video_device(
        &mut self,
        device_id: &str,
        publisher: Option<&dyn TrackPublisher>,
    ) -> Result<()> {
        self.replace_device(TrackKind::Video, device_id, publisher)
            .await
    }

    pub async fn replace_audio_device(
        &mut self,
        device_id: &str,
        publisher: Option<&dyn TrackPublisher>,
    ) -> Result<()> {
        self.replace_device(TrackKind::Audio, device_id, publisher)
            .await
    }

    /// Hot-swaps the capture device of one kind.
    ///
    /// Only the changed kind is captured again; the other track is left alone. On any
    /// failure the previous track and selection stay in place.
    async fn replace_device(
        &mut self,
        kind: TrackKind,
        device_id: &str,
        publisher: Option<&dyn TrackPublisher>,
    ) -> Result<()> {
        let device_kind = match kind {
            TrackKind::Video => DeviceKind::VideoInput,
            TrackKind::Audio => DeviceKind::AudioInput,
        };
        if !self.devices.contains(device_kind, device_id) {
            return Err(CallError::DeviceSwitch(format!(
                "{:?} device {} is not in the last enumeration",
                kind, device_id
            )));
        }

        let current = self
            .stream
            .as_ref()
            .map(|s| s.track(kind).map(|t| t.device_id().to_owned()));
        match current {
            None => {
                self.selection.set(device_kind, Some(device_id.to_owned()));
                return Ok(());
            }
            Some(Some(active)) if active == device_id => return Ok(()),
            Some(_) => {}
        }

        let mut fresh = self
            .backend
            .capture(&MediaConstraints::only(kind, device_id))
            .await
            .map_err(|e| CallError::DeviceSwitch(e.to_string()))?;
        let new_track = fresh.take_track(kind);
        fresh.stop_all();
        let Some(new_track) = new_track else {
            return Err(CallError::DeviceSwitch(format!(
                "capture of {} produced no {:?} track",
                device_id, kind
            )));
        };

        if let Some(publisher) = publisher {
            match publisher.replace_outbound_track(kind, &new_track).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(
                        "No outbound {:?} sender to replace, keeping device {:?}",
                        kind,
                        self.selection.get(device_kind)
                    );
                    new_track.stop();
                    return Ok(());
                }
                Err(e) => {
                    new_track.stop();
                    return Err(CallError::DeviceSwitch(e.to_string()));
                }
            }
        }

        if let Some(stream) = self.stream.as_mut()
            && let Some(old) = stream.swap_track(new_track)
        {
            old.stop();
        }
        self.selection.set(device_kind, Some(device_id.to_owned()));
        info!("Switched {:?} device to {}", kind, device_id);
        Ok(())
    }

    /// Best effort; returns whether the sink was applied.
    pub fn set_audio_output(&mut self, device_id: &str, output: &dyn AudioOutput) -> bool {
        if !self.devices.contains(DeviceKind::AudioOutput, device_id) {
            warn!("Unknown audio output {}, keeping current sink", device_id);
            return false;
        }
        if !output.supports_sink_selection() {
            warn!("Audio output does not support sink selection, keeping default sink");
            return false;
        }
        if let Err(e) = output.set_sink(device_id) {
            warn!("Failed to switch audio output to {}: {}", device_id, e);
            return false;
        }

        self.selection
            .set(DeviceKind::AudioOutput, Some(device_id.to_owned()));
        true
    }

    /// Stops every local track and forgets the stream. Idempotent.
    pub fn stop_all(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.stop_all();
            info!(stream = stream.id(), "Stopped local media");
        }
    }

    fn reconcile_selection(&mut self) {
        for kind in [
            DeviceKind::VideoInput,
            DeviceKind::AudioInput,
            DeviceKind::AudioOutput,
        ] {
            let still_present = self
                .selection
                .get(kind)
                .is_some_and(|id| self.devices.contains(kind, id));
            if !still_present {
                let first = self.devices.of_kind(kind).first().map(|d| d.device_id.clone());
                self.selection.set(kind, first);
            }
        }
    }
}
