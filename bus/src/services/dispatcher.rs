//! Inbound frame dispatch
//!
//! The bus answers `PING` and bridge traffic itself; every other envelope is
//! published to subscribers for the host to route.

use std::sync::Arc;

use shared::{Component, MessageEnvelope, MessageKind, component_debug, component_warn};

use crate::services::connection::ClientConnection;
use crate::state::BusState;
use crate::types::InboundMessage;

/// Handle one text frame from `connection`
///
/// Malformed frames are logged and dropped; the connection stays open.
pub fn dispatch_text(state: &Arc<BusState>, connection: &Arc<ClientConnection>, text: &str) {
    let envelope = match MessageEnvelope::from_json(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            component_warn!(Component::Bus, "Dropping malformed frame from {}: {}", connection.id(), e);
            return;
        }
    };

    component_debug!(Component::Bus, "📨 {} from {}", envelope.type_name(), connection.id());
    let request_id = envelope.id.clone();

    match envelope.kind {
        MessageKind::Ping => {
            connection.send_envelope(&reply(MessageKind::Pong, request_id));
        }
        MessageKind::FrontendBridgeRequest {
            service,
            method,
            params,
            request_id: call_id,
        } => {
            let bridge = state.bridge.clone();
            let connection = connection.clone();
            tokio::spawn(async move {
                let result = bridge.execute(&service, &method, params).await;
                connection.send_envelope(&reply(result.into_response(call_id), request_id));
            });
        }
        MessageKind::FrontendBridgeList {
            service,
            request_id: call_id,
        } => {
            let methods = state.bridge.list_methods(service.as_deref());
            let response = MessageKind::FrontendBridgeListResponse {
                count: methods.len(),
                methods,
                request_id: call_id,
            };
            connection.send_envelope(&reply(response, request_id));
        }
        kind => {
            let inbound = InboundMessage {
                client_id: connection.id().clone(),
                role: connection.role(),
                envelope: MessageEnvelope {
                    kind,
                    id: request_id,
                    timestamp: envelope.timestamp,
                },
            };
            // No subscribers is fine
            let _ = state.inbound.send(inbound);
        }
    }
}

fn reply(kind: MessageKind, id: Option<String>) -> MessageEnvelope {
    let envelope = MessageEnvelope::new(kind);
    match id {
        Some(id) => envelope.with_id(id),
        None => envelope,
    }
}
