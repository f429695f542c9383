//! Message bus state shared by the listener, connections and heartbeat

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::bridge::BridgeRegistry;
use crate::services::ClientRegistry;
use crate::types::InboundMessage;

const INBOUND_CAPACITY: usize = 1000;

pub struct BusState {
    pub registry: ClientRegistry,
    pub bridge: Arc<BridgeRegistry>,
    pub inbound: broadcast::Sender<InboundMessage>,
    epoch: Instant,
}

impl BusState {
    pub fn new(bridge: Arc<BridgeRegistry>) -> Self {
        let (inbound, _) = broadcast::channel(INBOUND_CAPACITY);

        Self {
            registry: ClientRegistry::new(),
            bridge,
            inbound,
            epoch: Instant::now(),
        }
    }

    /// Monotonic milliseconds since the bus was created
    pub fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}
