//! Common helpers for host end-to-end tests
//!
//! The worker is a `/bin/sh` script and the peers are `tokio-tungstenite`
//! clients, so a full host runs without Python.

use std::path::Path;
use std::time::Duration;

use bus::{BusAddress, BusConfig};
use futures_util::{SinkExt, StreamExt};
use host::HostSettings;
use shared::{ClientId, ClientRole, HttpClientConfig, MessageEnvelope, MessageKind};
use supervisor::{ServiceConfig, SupervisorSettings};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

pub type TestSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for a host whose worker runs `body` under `/bin/sh`
pub fn shell_host(dir: &Path, body: &str) -> HostSettings {
    let script = dir.join("worker.sh");
    std::fs::write(&script, body).unwrap();

    HostSettings {
        service: ServiceConfig::new(script)
            .with_python_path("/bin/sh")
            .with_port(8765)
            .with_restart_policy(false, 0),
        bus: BusConfig::default().with_heartbeat_interval(Duration::from_secs(60)),
        http: HttpClientConfig::for_port(8765).with_retries(0, Duration::from_millis(10)),
        supervisor: SupervisorSettings {
            stop_grace: Duration::from_secs(2),
            ..SupervisorSettings::default()
        },
        ready_timeout: Duration::from_millis(200),
    }
}

pub async fn connect(address: &BusAddress, role: ClientRole) -> (TestSocket, ClientId) {
    let (mut socket, _) = connect_async(address.url_for(role)).await.unwrap();

    match recv_matching(&mut socket, |kind| matches!(kind, MessageKind::ConnectionAck { .. })).await {
        MessageKind::ConnectionAck { client_id } => (socket, client_id),
        other => panic!("expected CONNECTION_ACK, got {other:?}"),
    }
}

/// Next envelope whose payload satisfies `wanted`, skipping everything else
pub async fn recv_matching(socket: &mut TestSocket, wanted: impl Fn(&MessageKind) -> bool) -> MessageKind {
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    loop {
        let frame = tokio::time::timeout_at(deadline, socket.next())
            .await
            .expect("no matching envelope received in time")
            .expect("socket ended")
            .expect("socket error");

        if let Message::Text(text) = frame {
            let envelope = MessageEnvelope::from_json(&text).unwrap();
            if wanted(&envelope.kind) {
                return envelope.kind;
            }
        }
    }
}

pub async fn send_envelope(socket: &mut TestSocket, kind: MessageKind) {
    let json = MessageEnvelope::new(kind).to_json().unwrap();
    socket.send(Message::Text(json)).await.unwrap();
}
