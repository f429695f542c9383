//! Socket envelope protocol
//!
//! Every frame on the bus is one JSON object `{type, id?, timestamp, ...}`
//! where `type` is drawn from the closed set in [`MessageKind`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{SharedError, SharedResult};
use crate::messages::bridge::BridgeMethodDescriptor;
use crate::types::{ClientId, LogEntry, ServiceProcessInfo};

/// Milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// One protocol message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    #[serde(flatten)]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default = "now_millis")]
    pub timestamp: i64,
}

/// Type-specific payloads, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum MessageKind {
    ConnectionAck {
        client_id: ClientId,
    },
    Ping,
    Pong,
    FrontendBridgeRequest {
        service: String,
        method: String,
        #[serde(default)]
        params: Value,
        request_id: String,
    },
    FrontendBridgeResponse {
        success: bool,
        request_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    FrontendBridgeList {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        service: Option<String>,
        request_id: String,
    },
    FrontendBridgeListResponse {
        methods: Vec<BridgeMethodDescriptor>,
        count: usize,
        request_id: String,
    },
    KnowledgeSyncCreate {
        knowledge: Value,
    },
    KnowledgeSyncDelete {
        knowledge_id: String,
    },
    PythonStatus {
        info: ServiceProcessInfo,
    },
    PythonLog {
        entry: LogEntry,
    },
    ChatRequest {
        conversation_id: String,
        content: String,
    },
    ChatStream {
        conversation_id: String,
        delta: String,
        #[serde(default)]
        done: bool,
    },
    AgentProgress {
        task_id: String,
        stage: String,
        progress: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Error {
        message: String,
    },
}

impl MessageKind {
    /// Wire name of the `type` tag
    pub fn type_name(&self) -> &'static str {
        match self {
            MessageKind::ConnectionAck { .. } => "CONNECTION_ACK",
            MessageKind::Ping => "PING",
            MessageKind::Pong => "PONG",
            MessageKind::FrontendBridgeRequest { .. } => "FRONTEND_BRIDGE_REQUEST",
            MessageKind::FrontendBridgeResponse { .. } => "FRONTEND_BRIDGE_RESPONSE",
            MessageKind::FrontendBridgeList { .. } => "FRONTEND_BRIDGE_LIST",
            MessageKind::FrontendBridgeListResponse { .. } => "FRONTEND_BRIDGE_LIST_RESPONSE",
            MessageKind::KnowledgeSyncCreate { .. } => "KNOWLEDGE_SYNC_CREATE",
            MessageKind::KnowledgeSyncDelete { .. } => "KNOWLEDGE_SYNC_DELETE",
            MessageKind::PythonStatus { .. } => "PYTHON_STATUS",
            MessageKind::PythonLog { .. } => "PYTHON_LOG",
            MessageKind::ChatRequest { .. } => "CHAT_REQUEST",
            MessageKind::ChatStream { .. } => "CHAT_STREAM",
            MessageKind::AgentProgress { .. } => "AGENT_PROGRESS",
            MessageKind::Error { .. } => "ERROR",
        }
    }
}

impl MessageEnvelope {
    /// Wrap a payload, stamping it with the current time
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            id: None,
            timestamp: now_millis(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn to_json(&self) -> SharedResult<String> {
        serde_json::to_string(self).map_err(|e| SharedError::SerializationError {
            message: format!("{} envelope: {e}", self.type_name()),
        })
    }

    pub fn from_json(text: &str) -> SharedResult<Self> {
        serde_json::from_str(text).map_err(|e| SharedError::DeserializationError {
            message: e.to_string(),
        })
    }
}

impl From<MessageKind> for MessageEnvelope {
    fn from(kind: MessageKind) -> Self {
        Self::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_connection_ack_wire_format() {
        let envelope = MessageEnvelope::new(MessageKind::ConnectionAck {
            client_id: ClientId::from("abc"),
        });
        let value: Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();

        assert_eq!(value["type"], "CONNECTION_ACK");
        assert_eq!(value["clientId"], "abc");
        assert!(value["timestamp"].is_i64());
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_bridge_request_parses_from_worker_frame() {
        let frame = json!({
            "type": "FRONTEND_BRIDGE_REQUEST",
            "id": "m-1",
            "timestamp": 1700000000000i64,
            "service": "knowledgeService",
            "method": "deleteKnowledge",
            "params": {"knowledgeId": "kb_1"},
            "requestId": "req-9"
        })
        .to_string();

        let envelope = MessageEnvelope::from_json(&frame).unwrap();
        assert_eq!(envelope.id.as_deref(), Some("m-1"));
        assert_eq!(envelope.timestamp, 1700000000000);
        match envelope.kind {
            MessageKind::FrontendBridgeRequest { service, method, params, request_id } => {
                assert_eq!(service, "knowledgeService");
                assert_eq!(method, "deleteKnowledge");
                assert_eq!(params["knowledgeId"], "kb_1");
                assert_eq!(request_id, "req-9");
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn test_ping_without_timestamp_gets_default() {
        let envelope = MessageEnvelope::from_json(r#"{"type":"PING"}"#).unwrap();
        assert_eq!(envelope.kind, MessageKind::Ping);
        assert!(envelope.timestamp > 0);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(MessageEnvelope::from_json(r#"{"type":"SELF_DESTRUCT"}"#).is_err());
        assert!(MessageEnvelope::from_json("not json at all").is_err());
    }

    #[test]
    fn test_bridge_response_omits_absent_fields() {
        let envelope = MessageEnvelope::new(MessageKind::FrontendBridgeResponse {
            success: false,
            request_id: "r".to_string(),
            result: None,
            error: Some("boom".to_string()),
        });
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["type"], "FRONTEND_BRIDGE_RESPONSE");
        assert_eq!(value["requestId"], "r");
        assert_eq!(value["error"], "boom");
        assert!(value.get("result").is_none());
    }

    #[test]
    fn test_type_name_matches_serialized_tag() {
        let kinds = vec![
            MessageKind::Pong,
            MessageKind::KnowledgeSyncDelete { knowledge_id: "kb".to_string() },
            MessageKind::FrontendBridgeList { service: None, request_id: "r".to_string() },
            MessageKind::Error { message: "x".to_string() },
        ];

        for kind in kinds {
            let value = serde_json::to_value(MessageEnvelope::new(kind.clone())).unwrap();
            assert_eq!(value["type"], kind.type_name());
        }
    }
}
