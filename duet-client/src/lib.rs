//! Peer-to-peer call orchestration: signaling, negotiation, recovery and media devices
//! for two-party audio/video calls.

pub mod analytics;
pub mod config;
pub mod error;
pub mod ice;
pub mod media;
pub mod peer;
pub mod reconnect;
pub mod retry;
pub mod session;
pub mod signaling;
pub mod status;

pub use config::{CallConfig, IceDiscoveryConfig, ReconnectConfig};
pub use error::{Alert, AlertSeverity, CallError, Result};
pub use session::{CallDeps, CallHandle, CallSession, EndReason, SessionEvent};
