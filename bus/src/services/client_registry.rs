//! Client registry service implementation
//!
//! Maintains the set of open peer connections. Mutated only by the connection
//! open/close paths, the heartbeat and shutdown.

use std::collections::HashMap;
use std::sync::Arc;

use shared::{ClientId, ClientRole};
use tokio::sync::RwLock;

use crate::services::connection::ClientConnection;
use crate::types::ClientInfo;

#[derive(Debug, Default)]
pub struct ClientRegistry {
    connections: RwLock<HashMap<ClientId, Arc<ClientConnection>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, connection: Arc<ClientConnection>) {
        let mut connections = self.connections.write().await;
        connections.insert(connection.id().clone(), connection);
    }

    pub async fn remove(&self, client_id: &ClientId) -> Option<Arc<ClientConnection>> {
        self.connections.write().await.remove(client_id)
    }

    pub async fn get(&self, client_id: &ClientId) -> Option<Arc<ClientConnection>> {
        self.connections.read().await.get(client_id).cloned()
    }

    /// Snapshot of every connection, taken without holding the lock afterwards
    pub async fn all(&self) -> Vec<Arc<ClientConnection>> {
        self.connections.read().await.values().cloned().collect()
    }

    pub async fn with_role(&self, role: ClientRole) -> Vec<Arc<ClientConnection>> {
        self.connections
            .read()
            .await
            .values()
            .filter(|connection| connection.role() == role)
            .cloned()
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Remove and return every connection
    pub async fn drain(&self) -> Vec<Arc<ClientConnection>> {
        self.connections.write().await.drain().map(|(_, connection)| connection).collect()
    }

    pub async fn infos(&self, now_ms: u64) -> Vec<ClientInfo> {
        let mut infos: Vec<ClientInfo> = self
            .connections
            .read()
            .await
            .values()
            .map(|connection| connection.info(now_ms))
            .collect();
        infos.sort_by_key(|info| info.connected_at);
        infos
    }
}
