//! Tests for the heartbeat sweep

use std::time::Duration;

use axum::extract::ws::Message;
use shared::ClientRole;

use super::helpers::*;
use crate::services::heartbeat::{SweepOutcome, sweep};

#[tokio::test]
async fn test_active_connections_are_pinged() {
    let state = create_test_state();
    let (connection, mut rx) = create_test_connection(&state, ClientRole::Ui);
    state.registry.add(connection).await;

    let outcome = sweep(&state, Duration::from_secs(60)).await;

    assert_eq!(outcome, SweepOutcome { pinged: 1, evicted: 0 });
    assert!(matches!(rx.try_recv(), Ok(Message::Ping(_))));
}

#[tokio::test]
async fn test_idle_connection_is_evicted_and_active_survives() {
    let state = create_test_state();
    let (idle, _idle_rx) = create_test_connection(&state, ClientRole::Ui);
    let (active, _active_rx) = create_test_connection(&state, ClientRole::Ui);
    let idle_id = idle.id().clone();
    let active_id = active.id().clone();
    state.registry.add(idle).await;
    state.registry.add(active.clone()).await;

    tokio::time::sleep(Duration::from_millis(120)).await;
    active.touch(state.now_ms());

    let outcome = sweep(&state, Duration::from_millis(100)).await;

    assert_eq!(outcome, SweepOutcome { pinged: 1, evicted: 1 });
    assert!(state.registry.get(&idle_id).await.is_none());
    assert!(state.registry.get(&active_id).await.is_some());
}

#[tokio::test]
async fn test_closed_queue_is_evicted() {
    let state = create_test_state();
    let (connection, rx) = create_test_connection(&state, ClientRole::Worker);
    state.registry.add(connection).await;
    drop(rx);

    let outcome = sweep(&state, Duration::from_secs(60)).await;

    assert_eq!(outcome.evicted, 1);
    assert_eq!(state.registry.count().await, 0);
}

#[test]
fn test_touch_never_moves_backwards() {
    let state = create_test_state();
    let (connection, _rx) = create_test_connection(&state, ClientRole::Ui);

    connection.touch(500);
    connection.touch(200);
    assert_eq!(connection.last_activity_ms(), 500);
}
