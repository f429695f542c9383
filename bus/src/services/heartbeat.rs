//! Heartbeat: ping live peers, terminate idle ones

use std::sync::Arc;
use std::time::Duration;

use shared::{Component, component_debug, component_info};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};

use crate::state::BusState;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    pub pinged: usize,
    pub evicted: usize,
}

/// One heartbeat pass over every connection
///
/// A connection with no inbound frame for longer than `idle_timeout` is
/// terminated (no closing handshake) and removed; every other one is pinged.
pub async fn sweep(state: &BusState, idle_timeout: Duration) -> SweepOutcome {
    let now = state.now_ms();
    let timeout_ms = idle_timeout.as_millis() as u64;
    let mut outcome = SweepOutcome::default();

    for connection in state.registry.all().await {
        let idle = now.saturating_sub(connection.last_activity_ms());

        if idle > timeout_ms || !connection.is_open() {
            state.registry.remove(connection.id()).await;
            connection.terminate();
            outcome.evicted += 1;
            component_info!(Component::Bus, "💀 Terminated idle connection {} ({} ms silent)", connection.id(), idle);
        } else if connection.ping() {
            outcome.pinged += 1;
        }
    }

    outcome
}

pub fn spawn_heartbeat(state: Arc<BusState>, interval: Duration) -> JoinHandle<()> {
    let idle_timeout = interval * 2;

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + interval, interval);
        loop {
            ticker.tick().await;
            let outcome = sweep(&state, idle_timeout).await;
            component_debug!(
                Component::Bus,
                "💓 Heartbeat pinged {} and evicted {}",
                outcome.pinged,
                outcome.evicted
            );
        }
    })
}
