pub use duet_core::model::{PeerId, RoomId};

pub mod model {
    pub use duet_core::model::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use duet_client::*;
}

#[cfg(feature = "client")]
pub use duet_client::{CallConfig, CallDeps, CallHandle, CallSession, SessionEvent};

#[cfg(feature = "server")]
pub mod server {
    pub use duet_server::*;
}
