//! Relay configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 15000;

/// Default cap on a single inbound frame, in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 202;

/// Default number of messages a peer's outbound queue holds before the
/// dispatcher blocks on it.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// What happens to a slot once the peer holding it disconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotPolicy {
    /// The slot stays occupied for the life of the relay. Once both players
    /// have joined, nobody else can take their place.
    #[default]
    Permanent,
    /// The slot is vacated when its peer's receive loop ends, so a new
    /// connection can take it.
    ReleaseOnDisconnect,
}

/// Configuration for the relay server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Interface address to listen on.
    pub host: IpAddr,

    /// Port to listen on for WebSocket upgrades.
    pub port: u16,

    /// The only request path that may be upgraded.
    pub path: String,

    /// Largest inbound frame/message the transport will accept.
    pub max_message_size: usize,

    /// Capacity of each peer's outbound queue.
    pub outbound_capacity: usize,

    /// Whether disconnected peers keep their slot.
    pub slot_policy: SlotPolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            path: "/".to_string(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            slot_policy: SlotPolicy::Permanent,
        }
    }
}

impl RelayConfig {
    /// The socket address built from `host` and `port`.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Save the config to a JSON file.
    pub fn save_to_file(&self, path: &Path) -> Result<(), RelayError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load config from a JSON file, or return defaults if the file is missing.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(data) => match serde_json::from_str::<RelayConfig>(&data) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Corrupt relay config {}, using defaults: {e}", path.display());
                    }
                },
                Err(e) => {
                    tracing::warn!("Cannot read relay config {}, using defaults: {e}", path.display());
                }
            }
        }
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
