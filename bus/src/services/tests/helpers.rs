//! Test helpers for bus service tests

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use serde_json::Value;
use shared::{BridgeMethodDescriptor, ClientId, ClientRole, MessageEnvelope, ParamDescriptor, ParamType};
use tokio::sync::mpsc;

use crate::bridge::BridgeRegistry;
use crate::services::ClientConnection;
use crate::state::BusState;

/// Bridge with a single `echoService.echo(text)` method
pub fn echo_bridge() -> BridgeRegistry {
    BridgeRegistry::builder()
        .register(
            BridgeMethodDescriptor::new("echoService", "echo", "Echo the input")
                .param(ParamDescriptor::required("text", ParamType::String, "Text to echo")),
            |args| async move { Ok(args.into_iter().next().unwrap_or(Value::Null)) },
        )
        .build()
}

pub fn create_test_state() -> Arc<BusState> {
    Arc::new(BusState::new(Arc::new(echo_bridge())))
}

/// Channel-backed connection plus the receiving end of its outbound queue
pub fn create_test_connection(
    state: &BusState,
    role: ClientRole,
) -> (Arc<ClientConnection>, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let connection = ClientConnection::new(ClientId::new(), role, tx, state.now_ms());
    (Arc::new(connection), rx)
}

/// Next queued text frame, parsed as an envelope
pub async fn next_envelope(rx: &mut mpsc::UnboundedReceiver<Message>) -> MessageEnvelope {
    let message = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("no frame queued in time")
        .expect("queue closed");

    match message {
        Message::Text(text) => MessageEnvelope::from_json(&text).unwrap(),
        other => panic!("expected text frame, got {other:?}"),
    }
}
