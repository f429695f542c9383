//! Tests for inbound frame dispatch

use serde_json::json;
use shared::{ClientRole, MessageKind};

use super::helpers::*;
use crate::services::dispatcher::dispatch_text;

#[tokio::test]
async fn test_ping_is_answered_with_pong() {
    let state = create_test_state();
    let mut inbound = state.inbound.subscribe();
    let (connection, mut rx) = create_test_connection(&state, ClientRole::Ui);

    dispatch_text(&state, &connection, r#"{"type":"PING","id":"p1","timestamp":1}"#);

    let reply = next_envelope(&mut rx).await;
    assert_eq!(reply.kind, MessageKind::Pong);
    assert_eq!(reply.id.as_deref(), Some("p1"));

    // PING is handled by the bus and never published
    assert!(inbound.try_recv().is_err());
}

#[tokio::test]
async fn test_malformed_frames_are_dropped() {
    let state = create_test_state();
    let mut inbound = state.inbound.subscribe();
    let (connection, mut rx) = create_test_connection(&state, ClientRole::Ui);

    dispatch_text(&state, &connection, "not json at all");
    dispatch_text(&state, &connection, r#"{"type":"NO_SUCH_TYPE"}"#);
    dispatch_text(&state, &connection, r#"{"id":"missing type"}"#);

    assert!(rx.try_recv().is_err());
    assert!(inbound.try_recv().is_err());
    assert!(connection.is_open());
}

#[tokio::test]
async fn test_bridge_request_gets_response() {
    let state = create_test_state();
    let (connection, mut rx) = create_test_connection(&state, ClientRole::Worker);

    let frame = json!({
        "type": "FRONTEND_BRIDGE_REQUEST",
        "service": "echoService",
        "method": "echo",
        "params": {"text": "hello"},
        "requestId": "req-1"
    });
    dispatch_text(&state, &connection, &frame.to_string());

    let reply = next_envelope(&mut rx).await;
    assert_eq!(
        reply.kind,
        MessageKind::FrontendBridgeResponse {
            success: true,
            request_id: "req-1".to_string(),
            result: Some(json!("hello")),
            error: None,
        }
    );
}

#[tokio::test]
async fn test_unregistered_bridge_method_gets_failure() {
    let state = create_test_state();
    let (connection, mut rx) = create_test_connection(&state, ClientRole::Worker);

    let frame = json!({
        "type": "FRONTEND_BRIDGE_REQUEST",
        "service": "echoService",
        "method": "__proto__",
        "requestId": "req-2"
    });
    dispatch_text(&state, &connection, &frame.to_string());

    match next_envelope(&mut rx).await.kind {
        MessageKind::FrontendBridgeResponse {
            success,
            request_id,
            error,
            ..
        } => {
            assert!(!success);
            assert_eq!(request_id, "req-2");
            assert!(error.unwrap().contains("not registered"));
        }
        other => panic!("unexpected reply {other:?}"),
    }
}

#[tokio::test]
async fn test_bridge_list_is_answered_from_catalog() {
    let state = create_test_state();
    let (connection, mut rx) = create_test_connection(&state, ClientRole::Worker);

    dispatch_text(
        &state,
        &connection,
        r#"{"type":"FRONTEND_BRIDGE_LIST","service":"echoService","requestId":"l1"}"#,
    );

    match next_envelope(&mut rx).await.kind {
        MessageKind::FrontendBridgeListResponse {
            methods,
            count,
            request_id,
        } => {
            assert_eq!(count, 1);
            assert_eq!(methods[0].method, "echo");
            assert_eq!(request_id, "l1");
        }
        other => panic!("unexpected reply {other:?}"),
    }
}

#[tokio::test]
async fn test_other_envelopes_are_published() {
    let state = create_test_state();
    let mut inbound = state.inbound.subscribe();
    let (connection, mut rx) = create_test_connection(&state, ClientRole::Worker);

    dispatch_text(
        &state,
        &connection,
        r#"{"type":"KNOWLEDGE_SYNC_DELETE","knowledgeId":"kb_1","timestamp":42}"#,
    );

    let message = inbound.try_recv().unwrap();
    assert_eq!(&message.client_id, connection.id());
    assert_eq!(message.role, ClientRole::Worker);
    assert_eq!(message.envelope.timestamp, 42);
    assert_eq!(
        message.envelope.kind,
        MessageKind::KnowledgeSyncDelete {
            knowledge_id: "kb_1".to_string()
        }
    );
    assert!(rx.try_recv().is_err());
}
