use anyhow::{Context, Result};
use duet_core::IceServerConfig;
use duet_core::utils::default_ice_servers;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Servers handed out by `/api/ice-servers`.
    pub ice_servers: Vec<IceServerConfig>,
    /// Key required by `/api/ice-servers`; the endpoint is disabled without one.
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            ice_servers: default_ice_servers(),
            api_key: None,
        }
    }
}

impl ServerConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&text).context("Failed to parse server configuration")
    }
}
