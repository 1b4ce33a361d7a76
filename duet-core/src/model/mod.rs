mod analytics;
mod media;
mod peer;
mod room;
mod signaling;
mod status;

pub use analytics::{CallAnalyticsRecord, EmotionEvent, StreamSource};
pub use media::{
    DeviceKind, DeviceList, DeviceSelection, MediaConstraints, MediaDeviceInfo, TrackConstraint,
    TrackKind,
};
pub use peer::PeerId;
pub use room::{ROOM_CAPACITY, RoomId};
pub use signaling::{IceCandidate, IceServerConfig, SignalKind, SignalMessage};
pub use status::{ChannelStatus, ConnectionStatus, IceState, OverallStatus, PeerState};
