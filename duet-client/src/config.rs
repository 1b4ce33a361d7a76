use crate::retry::RetryPolicy;
use anyhow::{Context, Result};
use duet_core::IceServerConfig;
use duet_core::utils::default_ice_servers;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration of a single call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    /// Base websocket URL of the rendezvous server; the peer id is appended as a path segment.
    pub signaling_url: String,
    pub ice: IceDiscoveryConfig,
    pub signaling_retry: RetryPolicy,
    pub reconnect: ReconnectConfig,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            signaling_url: "ws://127.0.0.1:3000/ws".to_owned(),
            ice: IceDiscoveryConfig::default(),
            signaling_retry: RetryPolicy::fixed(5, Duration::from_secs(1)),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl CallConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse call configuration")
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json_str(&text)
    }
}

/// Where ICE servers come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IceDiscoveryConfig {
    /// HTTPS endpoint returning STUN/TURN credentials. `None` skips straight to the fallback.
    pub credential_url: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_ms: u64,
    pub fallback: Vec<IceServerConfig>,
}

impl Default for IceDiscoveryConfig {
    fn default() -> Self {
        Self {
            credential_url: None,
            api_key: None,
            request_timeout_ms: 5_000,
            fallback: default_ice_servers(),
        }
    }
}

impl IceDiscoveryConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Peer-connection recovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// How long a `disconnected` connection may self-heal before recovery starts.
    pub disconnect_grace_ms: u64,
    /// Pause between tearing a connection down and re-offering.
    pub recovery_delay_ms: u64,
    pub max_attempts: u32,
    /// How long to wait for the remote peer to rejoin after it left the room.
    pub rejoin_grace_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            disconnect_grace_ms: 5_000,
            recovery_delay_ms: 2_000,
            max_attempts: 5,
            rejoin_grace_ms: 30_000,
        }
    }
}

impl ReconnectConfig {
    pub fn disconnect_grace(&self) -> Duration {
        Duration::from_millis(self.disconnect_grace_ms)
    }

    pub fn rejoin_grace(&self) -> Duration {
        Duration::from_millis(self.rejoin_grace_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.max_attempts,
            Duration::from_millis(self.recovery_delay_ms),
        )
    }
}
