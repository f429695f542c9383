//! Bus configuration and connection snapshot types

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{ClientId, ClientRole, MessageEnvelope};

pub const DEFAULT_BUS_HOST: &str = "127.0.0.1";
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Listener and heartbeat settings
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub host: String,
    /// 0 binds an ephemeral port
    pub port: u16,
    pub heartbeat_interval: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BUS_HOST.to_string(),
            port: 0,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

impl BusConfig {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Connections idle longer than this are terminated
    pub fn idle_timeout(&self) -> Duration {
        self.heartbeat_interval * 2
    }
}

/// Address the bus actually listens on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusAddress {
    pub host: String,
    pub port: u16,
}

impl BusAddress {
    /// WebSocket URL for a peer of the given role
    pub fn url_for(&self, role: ClientRole) -> String {
        format!("ws://{}:{}/?role={}", self.host, self.port, role)
    }
}

/// Point-in-time view of one connection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub client_id: ClientId,
    pub role: ClientRole,
    pub connected_at: DateTime<Utc>,
    /// Milliseconds since the last inbound frame
    pub idle_ms: u64,
}

/// An envelope received from a peer that the bus does not answer itself
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub client_id: ClientId,
    pub role: ClientRole,
    pub envelope: MessageEnvelope,
}

/// Query parameters accepted on the upgrade request
#[derive(Debug, Default, Deserialize)]
pub struct ConnectParams {
    #[serde(default)]
    pub role: ClientRole,
}
