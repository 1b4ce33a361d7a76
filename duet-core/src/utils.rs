use crate::model::IceServerConfig;

pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_2: &str = "stun:stun1.l.google.com:19302";

/// Public STUN servers used whenever no credential endpoint answers.
pub fn default_ice_servers() -> Vec<IceServerConfig> {
    [DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2]
        .into_iter()
        .map(IceServerConfig::stun)
        .collect()
}

/// Milliseconds since the unix epoch.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
