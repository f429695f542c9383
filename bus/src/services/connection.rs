//! WebSocket connection handling
//!
//! Each peer gets a writer task draining an unbounded queue into the socket
//! and a reader task feeding inbound frames to the dispatcher. Both tasks are
//! abortable, which is how the heartbeat terminates a half-open peer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use chrono::{DateTime, Utc};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use shared::{ClientId, ClientRole, Component, MessageEnvelope, MessageKind, component_debug, component_info, component_warn};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};

use crate::services::dispatcher::dispatch_text;
use crate::state::BusState;
use crate::types::{ClientInfo, ConnectParams};

const CLOSE_NORMAL: u16 = 1000;

/// One open peer connection
#[derive(Debug)]
pub struct ClientConnection {
    id: ClientId,
    role: ClientRole,
    connected_at: DateTime<Utc>,
    sender: mpsc::UnboundedSender<Message>,
    last_activity_ms: AtomicU64,
    writer: Mutex<Option<JoinHandle<()>>>,
    reader: Mutex<Option<AbortHandle>>,
}

impl ClientConnection {
    pub fn new(id: ClientId, role: ClientRole, sender: mpsc::UnboundedSender<Message>, now_ms: u64) -> Self {
        Self {
            id,
            role,
            connected_at: Utc::now(),
            sender,
            last_activity_ms: AtomicU64::new(now_ms),
            writer: Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &ClientId {
        &self.id
    }

    pub fn role(&self) -> ClientRole {
        self.role
    }

    /// Record inbound activity
    pub fn touch(&self, now_ms: u64) {
        self.last_activity_ms.fetch_max(now_ms, Ordering::Relaxed);
    }

    pub fn last_activity_ms(&self) -> u64 {
        self.last_activity_ms.load(Ordering::Relaxed)
    }

    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Queue an already serialized frame; false when the writer is gone
    pub fn send_text(&self, text: String) -> bool {
        self.sender.send(Message::Text(text)).is_ok()
    }

    pub fn send_envelope(&self, envelope: &MessageEnvelope) -> bool {
        match envelope.to_json() {
            Ok(json) => self.send_text(json),
            Err(e) => {
                component_warn!(Component::Bus, "Failed to serialize {} for {}: {}", envelope.type_name(), self.id, e);
                false
            }
        }
    }

    /// Protocol-level ping; the peer's pong counts as activity
    pub fn ping(&self) -> bool {
        self.sender.send(Message::Ping(Vec::new())).is_ok()
    }

    pub fn attach_writer(&self, writer: JoinHandle<()>) {
        if let Ok(mut slot) = self.writer.lock() {
            *slot = Some(writer);
        }
    }

    pub fn attach_reader(&self, reader: AbortHandle) {
        if let Ok(mut slot) = self.reader.lock() {
            *slot = Some(reader);
        }
    }

    /// Drop the socket without a closing handshake
    pub fn terminate(&self) {
        if let Some(writer) = self.writer.lock().ok().and_then(|mut slot| slot.take()) {
            writer.abort();
        }
        if let Some(reader) = self.reader.lock().ok().and_then(|mut slot| slot.take()) {
            reader.abort();
        }
    }

    /// Send a close frame, give the writer `flush` to deliver it, then tear down
    pub async fn close(&self, flush: Duration) {
        let frame = CloseFrame {
            code: CLOSE_NORMAL,
            reason: "server shutting down".into(),
        };
        let _ = self.sender.send(Message::Close(Some(frame)));

        let writer = self.writer.lock().ok().and_then(|mut slot| slot.take());
        if let Some(mut writer) = writer {
            if tokio::time::timeout(flush, &mut writer).await.is_err() {
                writer.abort();
            }
        }
        self.terminate();
    }

    pub fn info(&self, now_ms: u64) -> ClientInfo {
        ClientInfo {
            client_id: self.id.clone(),
            role: self.role,
            connected_at: self.connected_at,
            idle_ms: now_ms.saturating_sub(self.last_activity_ms()),
        }
    }
}

/// Upgrade handler; the peer declares its role with `?role=worker|ui`
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<BusState>>,
) -> Response {
    ws.on_upgrade(move |socket| accept_connection(socket, params.role, state))
}

async fn accept_connection(socket: WebSocket, role: ClientRole, state: Arc<BusState>) {
    let (sink, stream) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();

    let connection = Arc::new(ClientConnection::new(ClientId::new(), role, tx, state.now_ms()));
    let client_id = connection.id().clone();

    // Acknowledge before anything else can be queued for this peer
    let ack = MessageEnvelope::new(MessageKind::ConnectionAck {
        client_id: client_id.clone(),
    });
    connection.send_envelope(&ack);

    // Registered before the writer runs, so a peer holding the ack is counted
    state.registry.add(connection.clone()).await;
    connection.attach_writer(tokio::spawn(write_loop(sink, rx, client_id.clone())));

    let reader = tokio::spawn(read_loop(stream, connection.clone(), state.clone()));
    connection.attach_reader(reader.abort_handle());

    component_info!(Component::Bus, "🔗 New {} connection: {}", role, client_id);
}

async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
    client_id: ClientId,
) {
    while let Some(message) = rx.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(e) = sink.send(message).await {
            component_debug!(Component::Bus, "Write to {} failed: {}", client_id, e);
            break;
        }
        if closing {
            break;
        }
    }

    let _ = sink.close().await;
    component_debug!(Component::Bus, "Writer for {} finished", client_id);
}

async fn read_loop(mut stream: SplitStream<WebSocket>, connection: Arc<ClientConnection>, state: Arc<BusState>) {
    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                component_debug!(Component::Bus, "Read from {} failed: {}", connection.id(), e);
                break;
            }
        };

        connection.touch(state.now_ms());

        match frame {
            Message::Text(text) => dispatch_text(&state, &connection, &text),
            Message::Binary(bytes) => match String::from_utf8(bytes) {
                Ok(text) => dispatch_text(&state, &connection, &text),
                Err(_) => component_warn!(Component::Bus, "Dropping non-UTF-8 binary frame from {}", connection.id()),
            },
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => break,
        }
    }

    if state.registry.remove(connection.id()).await.is_some() {
        component_info!(Component::Bus, "👋 Connection closed: {}", connection.id());
    }
}
