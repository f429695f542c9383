//! Common helpers for message bus integration tests
//!
//! Peers are real `tokio-tungstenite` clients talking to a bus bound on an
//! ephemeral port.

use std::sync::Arc;
use std::time::Duration;

use bus::{BridgeRegistry, BusAddress, BusConfig, MessageBus};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use shared::{ClientId, ClientRole, MessageEnvelope, MessageKind};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

pub type TestSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Start a bus with the given bridge and heartbeat interval
pub async fn start_bus(bridge: BridgeRegistry, heartbeat: Duration) -> (MessageBus, BusAddress) {
    let bus = MessageBus::new(Arc::new(bridge));
    let config = BusConfig::default().with_heartbeat_interval(heartbeat);
    let address = bus.start_server(config).await.unwrap();
    (bus, address)
}

/// Bus with an empty bridge and a heartbeat that stays out of the way
pub async fn start_quiet_bus() -> (MessageBus, BusAddress) {
    start_bus(BridgeRegistry::default(), Duration::from_secs(60)).await
}

/// Connect as `role` and consume the connection acknowledgement
pub async fn connect(address: &BusAddress, role: ClientRole) -> (TestSocket, ClientId) {
    let (mut socket, _) = connect_async(address.url_for(role)).await.unwrap();

    match recv_envelope(&mut socket).await.kind {
        MessageKind::ConnectionAck { client_id } => (socket, client_id),
        other => panic!("expected CONNECTION_ACK, got {other:?}"),
    }
}

/// Next envelope, skipping control frames
pub async fn recv_envelope(socket: &mut TestSocket) -> MessageEnvelope {
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    loop {
        let frame = tokio::time::timeout_at(deadline, socket.next())
            .await
            .expect("no envelope received in time")
            .expect("socket ended")
            .expect("socket error");

        match frame {
            Message::Text(text) => return MessageEnvelope::from_json(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame {other:?}"),
        }
    }
}

pub async fn send_json(socket: &mut TestSocket, value: Value) {
    socket.send(Message::Text(value.to_string())).await.unwrap();
}

pub async fn send_raw(socket: &mut TestSocket, text: &str) {
    socket.send(Message::Text(text.to_string())).await.unwrap();
}

pub async fn send_envelope(socket: &mut TestSocket, kind: MessageKind) {
    let json = MessageEnvelope::new(kind).to_json().unwrap();
    socket.send(Message::Text(json)).await.unwrap();
}

/// Whether the server has closed this socket (close frame, EOF or reset)
pub async fn wait_for_close(socket: &mut TestSocket) -> bool {
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    loop {
        match tokio::time::timeout_at(deadline, socket.next()).await {
            Err(_) => return false,
            Ok(None) | Ok(Some(Err(_))) | Ok(Some(Ok(Message::Close(_)))) => return true,
            Ok(Some(Ok(_))) => continue,
        }
    }
}

/// Poll until the bus reports `expected` connections
pub async fn wait_for_client_count(bus: &MessageBus, expected: usize) -> bool {
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if bus.client_count().await == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
