use duet_core::TrackKind;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Outbound media track bound to one capture device.
///
/// Clones share the same underlying track and the same live flag.
#[derive(Clone)]
pub struct LocalTrack {
    id: String,
    kind: TrackKind,
    device_id: String,
    rtp: Arc<TrackLocalStaticSample>,
    live: Arc<AtomicBool>,
}

impl LocalTrack {
    pub fn new(kind: TrackKind, device_id: impl Into<String>, stream_id: &str) -> Self {
        let id = Uuid::new_v4().to_string();
        let mime_type = match kind {
            TrackKind::Audio => MIME_TYPE_OPUS,
            TrackKind::Video => MIME_TYPE_VP8,
        };
        let rtp = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: mime_type.to_owned(),
                ..Default::default()
            },
            id.clone(),
            stream_id.to_owned(),
        ));

        Self {
            id,
            kind,
            device_id: device_id.into(),
            rtp,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Releases the capture device. Idempotent.
    pub fn stop(&self) {
        self.live.store(false, Ordering::Release);
    }

    pub fn sample_track(&self) -> Arc<TrackLocalStaticSample> {
        self.rtp.clone()
    }

    pub fn rtp_track(&self) -> Arc<dyn TrackLocal + Send + Sync> {
        self.rtp.clone()
    }
}

impl std::fmt::Debug for LocalTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("device_id", &self.device_id)
            .field("live", &self.is_live())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct MediaStream {
    id: String,
    tracks: Vec<LocalTrack>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>, tracks: Vec<LocalTrack>) -> Self {
        Self {
            id: id.into(),
            tracks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[LocalTrack] {
        &self.tracks
    }

    pub fn track(&self, kind: TrackKind) -> Option<&LocalTrack> {
        self.tracks.iter().find(|t| t.kind() == kind)
    }

    pub fn take_track(&mut self, kind: TrackKind) -> Option<LocalTrack> {
        let index = self.tracks.iter().position(|t| t.kind() == kind)?;
        Some(self.tracks.remove(index))
    }

    /// Puts `track` in place of the current track of the same kind and returns the old one.
    pub fn swap_track(&mut self, track: LocalTrack) -> Option<LocalTrack> {
        let old = self.take_track(track.kind());
        self.tracks.push(track);
        old
    }

    pub fn is_live(&self) -> bool {
        self.tracks.iter().any(LocalTrack::is_live)
    }

    pub fn live_track_count(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_live()).count()
    }

    pub fn stop_all(&self) {
        for track in &self.tracks {
            track.stop();
        }
    }
}

/// Remote media published once per peer connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    pub stream_id: String,
    pub tracks: Vec<RemoteTrackInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrackInfo {
    pub kind: TrackKind,
    pub track_id: String,
    pub stream_id: String,
}
