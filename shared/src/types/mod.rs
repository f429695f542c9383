//! Core types used throughout the host

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Host subsystem that emitted a log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    Host,
    Supervisor,
    Bus,
    Bridge,
    Http,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Host => write!(f, "host"),
            Component::Supervisor => write!(f, "supervisor"),
            Component::Bus => write!(f, "bus"),
            Component::Bridge => write!(f, "bridge"),
            Component::Http => write!(f, "http"),
        }
    }
}

/// Opaque, process-unique identifier for a socket peer
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub String);

impl ClientId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ClientId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Which side of the bus a peer sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientRole {
    /// UI renderer window
    #[default]
    Ui,
    /// The supervised worker process
    Worker,
}

impl fmt::Display for ClientRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientRole::Ui => write!(f, "ui"),
            ClientRole::Worker => write!(f, "worker"),
        }
    }
}

/// Lifecycle status of the supervised worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

impl ServiceStatus {
    /// True while an OS process handle is (or is about to be) held
    pub fn is_active(&self) -> bool {
        matches!(self, ServiceStatus::Starting | ServiceStatus::Running | ServiceStatus::Stopping)
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceStatus::Stopped => "stopped",
            ServiceStatus::Starting => "starting",
            ServiceStatus::Running => "running",
            ServiceStatus::Stopping => "stopping",
            ServiceStatus::Error => "error",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Where a captured log line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    Stdout,
    Stderr,
    Supervisor,
}

/// One entry in the supervisor's bounded log buffer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub source: LogSource,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, source: LogSource, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            source,
            message: message.into(),
        }
    }
}

/// Snapshot of the supervised worker, as returned by `get_info()`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceProcessInfo {
    pub status: ServiceStatus,
    pub pid: Option<u32>,
    pub port: Option<u16>,
    pub started_at: Option<DateTime<Utc>>,
    /// Seconds since `started_at`, only populated while running
    pub uptime_secs: Option<u64>,
    pub restart_count: u32,
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<LogEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_generation() {
        let id1 = ClientId::new();
        let id2 = ClientId::new();
        assert_ne!(id1, id2, "Client IDs should be unique");
    }

    #[test]
    fn test_client_role_wire_names() {
        assert_eq!(serde_json::to_string(&ClientRole::Worker).unwrap(), "\"worker\"");
        let role: ClientRole = serde_json::from_str("\"ui\"").unwrap();
        assert_eq!(role, ClientRole::Ui);
    }

    #[test]
    fn test_service_status_activity() {
        assert!(ServiceStatus::Running.is_active());
        assert!(ServiceStatus::Stopping.is_active());
        assert!(!ServiceStatus::Stopped.is_active());
        assert!(!ServiceStatus::Error.is_active());
        assert_eq!(ServiceStatus::Error.to_string(), "error");
    }
}
