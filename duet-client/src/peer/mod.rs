mod peer_manager;
mod peer_state;
mod rtc;
mod webrtc_connector;

pub use peer_manager::*;
pub use peer_state::*;
pub use rtc::*;
pub use webrtc_connector::*;
