//! ICE server discovery.
//!
//! Credentials are fetched from an HTTPS endpoint given an API key. Any failure
//! degrades to the configured public STUN list so a call stays attemptable.

use crate::config::IceDiscoveryConfig;
use duet_core::IceServerConfig;
use duet_core::utils::default_ice_servers;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum IceFetchError {
    #[error("credential request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("credential endpoint answered {0}")]
    Status(StatusCode),

    #[error("credential endpoint returned no ICE servers")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceSource {
    Endpoint,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct IceServers {
    pub servers: Vec<IceServerConfig>,
    pub source: IceSource,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Urls {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize)]
struct WireIceServer {
    urls: Urls,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    credential: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CredentialResponse {
    List(Vec<WireIceServer>),
    #[serde(rename_all = "camelCase")]
    Wrapped {
        ice_servers: Vec<WireIceServer>,
    },
}

impl From<WireIceServer> for IceServerConfig {
    fn from(server: WireIceServer) -> Self {
        let urls = match server.urls {
            Urls::One(url) => vec![url],
            Urls::Many(urls) => urls,
        };
        Self {
            urls,
            username: server.username,
            credential: server.credential,
        }
    }
}

#[derive(Clone)]
pub struct IceServerProvider {
    client: reqwest::Client,
    config: IceDiscoveryConfig,
}

impl IceServerProvider {
    pub fn new(config: IceDiscoveryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    /// Resolves the ICE servers for a call. Never fails.
    pub async fn resolve(&self) -> IceServers {
        let Some(url) = &self.config.credential_url else {
            info!("No ICE credential endpoint configured, using fallback STUN servers");
            return self.fallback();
        };

        match self.fetch(url).await {
            Ok(servers) => {
                info!(
                    count = servers.len(),
                    turn = servers.iter().any(IceServerConfig::is_turn),
                    "Fetched ICE servers"
                );
                IceServers {
                    servers,
                    source: IceSource::Endpoint,
                }
            }
            Err(e) => {
                warn!("ICE credential fetch failed, falling back to public STUN: {}", e);
                self.fallback()
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<IceServerConfig>, IceFetchError> {
        let mut request = self.client.get(url);
        if let Some(key) = &self.config.api_key {
            request = request.query(&[("apiKey", key)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IceFetchError::Status(status));
        }

        let servers: Vec<IceServerConfig> = match response.json::<CredentialResponse>().await? {
            CredentialResponse::List(list) => list.into_iter().map(Into::into).collect(),
            CredentialResponse::Wrapped { ice_servers } => {
                ice_servers.into_iter().map(Into::into).collect()
            }
        };

        if servers.is_empty() {
            return Err(IceFetchError::Empty);
        }
        Ok(servers)
    }

    fn fallback(&self) -> IceServers {
        let servers = if self.config.fallback.is_empty() {
            default_ice_servers()
        } else {
            self.config.fallback.clone()
        };
        IceServers {
            servers,
            source: IceSource::Fallback,
        }
    }
}
