//! Routing between worker and UI peers
//!
//! The bus answers pings and bridge calls itself; everything else it publishes
//! is relayed here based on who sent it. Supervisor events are forwarded to UI
//! peers as `PYTHON_STATUS` / `PYTHON_LOG`.

use bus::{InboundMessage, MessageBus};
use shared::{ClientRole, Component, MessageKind, component_debug, component_warn};
use supervisor::SupervisorEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    Ui,
    Worker,
    Drop,
}

/// Where an envelope from a peer of role `from` should go
pub fn route_target(from: ClientRole, kind: &MessageKind) -> RouteTarget {
    use MessageKind::*;

    match (from, kind) {
        (
            ClientRole::Worker,
            ChatStream { .. } | AgentProgress { .. } | KnowledgeSyncCreate { .. } | KnowledgeSyncDelete { .. } | Error { .. },
        ) => RouteTarget::Ui,
        (ClientRole::Ui, ChatRequest { .. }) => RouteTarget::Worker,
        _ => RouteTarget::Drop,
    }
}

pub fn spawn_inbound_router(bus: MessageBus) -> JoinHandle<()> {
    let mut inbound = bus.subscribe();

    tokio::spawn(async move {
        loop {
            match inbound.recv().await {
                Ok(message) => route(&bus, message).await,
                Err(RecvError::Lagged(skipped)) => {
                    component_warn!(Component::Host, "⚠️ Router lagged, {} inbound messages skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

async fn route(bus: &MessageBus, message: InboundMessage) {
    let role = match route_target(message.role, &message.envelope.kind) {
        RouteTarget::Ui => ClientRole::Ui,
        RouteTarget::Worker => ClientRole::Worker,
        RouteTarget::Drop => {
            component_debug!(
                Component::Host,
                "Ignoring {} from {} peer {}",
                message.envelope.type_name(),
                message.role,
                message.client_id
            );
            return;
        }
    };

    let type_name = message.envelope.type_name();
    match bus.send_to_role(role, message.envelope).await {
        Ok(0) if role == ClientRole::Worker => {
            let notice = MessageKind::Error {
                message: format!("Worker is not connected; {type_name} was not delivered"),
            };
            bus.send_to_client(&message.client_id, notice).await;
        }
        Ok(delivered) => {
            component_debug!(Component::Host, "Relayed {} to {} {} peers", type_name, delivered, role);
        }
        Err(e) => {
            component_warn!(Component::Host, "Failed to relay {}: {}", type_name, e);
        }
    }
}

/// Relay supervisor status and log events to UI peers
pub fn spawn_supervisor_forwarder(bus: MessageBus, mut events: broadcast::Receiver<SupervisorEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let kind = match events.recv().await {
                Ok(SupervisorEvent::Status(info)) => MessageKind::PythonStatus { info },
                Ok(SupervisorEvent::Log(entry)) => MessageKind::PythonLog { entry },
                Err(RecvError::Lagged(skipped)) => {
                    component_warn!(Component::Host, "⚠️ Dropped {} supervisor events", skipped);
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            if let Err(e) = bus.send_to_role(ClientRole::Ui, kind).await {
                component_warn!(Component::Host, "Failed to forward supervisor event: {}", e);
            }
        }
    })
}
