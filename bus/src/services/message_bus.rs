//! Message bus server
//!
//! Owns the listener, the heartbeat task and the connection registry. Cloning
//! a `MessageBus` yields another handle to the same server.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use futures_util::future::join_all;
use shared::{ClientId, ClientRole, Component, MessageEnvelope, component_debug, component_info, component_warn};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, broadcast, oneshot};
use tokio::task::JoinHandle;

use crate::bridge::BridgeRegistry;
use crate::error::{BusError, BusResult};
use crate::services::connection::websocket_handler;
use crate::services::heartbeat::spawn_heartbeat;
use crate::state::BusState;
use crate::types::{BusAddress, BusConfig, ClientInfo, InboundMessage};

const CLOSE_FLUSH: Duration = Duration::from_millis(500);
const SERVER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

struct RunningServer {
    address: BusAddress,
    shutdown_tx: oneshot::Sender<()>,
    server_task: JoinHandle<()>,
    heartbeat_task: JoinHandle<()>,
}

#[derive(Clone)]
pub struct MessageBus {
    state: Arc<BusState>,
    server: Arc<Mutex<Option<RunningServer>>>,
}

impl MessageBus {
    pub fn new(bridge: Arc<BridgeRegistry>) -> Self {
        Self::with_state(Arc::new(BusState::new(bridge)))
    }

    pub(crate) fn with_state(state: Arc<BusState>) -> Self {
        Self {
            state,
            server: Arc::new(Mutex::new(None)),
        }
    }

    /// Bind and serve; while already running, returns the existing address
    pub async fn start_server(&self, config: BusConfig) -> BusResult<BusAddress> {
        let mut server = self.server.lock().await;
        if let Some(running) = server.as_ref() {
            component_debug!(Component::Bus, "Message bus already listening on port {}", running.address.port);
            return Ok(running.address.clone());
        }

        let bind_address = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&bind_address)
            .await
            .map_err(|source| BusError::BindFailed {
                address: bind_address.clone(),
                source,
            })?;
        let local = listener.local_addr()?;
        let address = BusAddress {
            host: config.host.clone(),
            port: local.port(),
        };

        let app = Router::new()
            .route("/", get(websocket_handler))
            .route("/ws", get(websocket_handler))
            .with_state(self.state.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server_task = tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
                component_warn!(Component::Bus, "Message bus server error: {}", e);
            }
        });
        let heartbeat_task = spawn_heartbeat(self.state.clone(), config.heartbeat_interval);

        component_info!(
            Component::Bus,
            "🚀 Message bus listening on ws://{}:{} (heartbeat every {:?})",
            address.host,
            address.port,
            config.heartbeat_interval
        );

        *server = Some(RunningServer {
            address: address.clone(),
            shutdown_tx,
            server_task,
            heartbeat_task,
        });

        Ok(address)
    }

    /// Stop the heartbeat, close every connection, then close the listener
    pub async fn stop_server(&self) -> BusResult<()> {
        let Some(running) = self.server.lock().await.take() else {
            return Ok(());
        };

        running.heartbeat_task.abort();

        let connections = self.state.registry.drain().await;
        let count = connections.len();
        join_all(connections.iter().map(|connection| connection.close(CLOSE_FLUSH))).await;

        let _ = running.shutdown_tx.send(());
        let mut server_task = running.server_task;
        if tokio::time::timeout(SERVER_SHUTDOWN_TIMEOUT, &mut server_task).await.is_err() {
            component_warn!(Component::Bus, "⚠️ Listener did not shut down in time, aborting");
            server_task.abort();
        }

        component_info!(Component::Bus, "🛑 Message bus stopped ({} connections closed)", count);
        Ok(())
    }

    pub async fn address(&self) -> Option<BusAddress> {
        self.server.lock().await.as_ref().map(|running| running.address.clone())
    }

    pub async fn is_running(&self) -> bool {
        self.server.lock().await.is_some()
    }

    /// Serialize once and queue to every open connection; returns how many accepted it
    pub async fn broadcast(&self, message: impl Into<MessageEnvelope>) -> BusResult<usize> {
        let envelope = message.into();
        let json = envelope.to_json()?;

        let delivered = self
            .state
            .registry
            .all()
            .await
            .into_iter()
            .filter(|connection| connection.send_text(json.clone()))
            .count();

        component_debug!(Component::Bus, "📡 Broadcast {} to {} clients", envelope.type_name(), delivered);
        Ok(delivered)
    }

    /// Deliver to every open connection of one role
    pub async fn send_to_role(&self, role: ClientRole, message: impl Into<MessageEnvelope>) -> BusResult<usize> {
        let json = message.into().to_json()?;

        Ok(self
            .state
            .registry
            .with_role(role)
            .await
            .into_iter()
            .filter(|connection| connection.send_text(json.clone()))
            .count())
    }

    /// False when no open connection has this id
    pub async fn send_to_client(&self, client_id: &ClientId, message: impl Into<MessageEnvelope>) -> bool {
        match self.state.registry.get(client_id).await {
            Some(connection) => connection.send_envelope(&message.into()),
            None => false,
        }
    }

    pub async fn client_count(&self) -> usize {
        self.state.registry.count().await
    }

    pub async fn connected_clients(&self) -> Vec<ClientInfo> {
        self.state.registry.infos(self.state.now_ms()).await
    }

    /// Envelopes received from peers that the bus does not answer itself
    pub fn subscribe(&self) -> broadcast::Receiver<InboundMessage> {
        self.state.inbound.subscribe()
    }

    pub fn bridge(&self) -> &Arc<BridgeRegistry> {
        &self.state.bridge
    }
}
