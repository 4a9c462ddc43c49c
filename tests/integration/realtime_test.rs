//! Realtime dispatch integration tests

use std::sync::Arc;

use pagewright::backend::error::HttpError;
use pagewright::backend::realtime::{broadcast_event, dispatch_inbound, RealtimeEventBroadcast};
use pagewright::backend::registry::{socket_listener, Registry, SocketContext};
use pagewright::shared::{RealtimeEvent, SocketMessage};
use serde_json::json;
use uuid::Uuid;

fn registry() -> Arc<Registry> {
    let mut registry = Registry::new();
    registry
        .add_socket_event(
            "user.get",
            socket_listener(|context: SocketContext, data| async move {
                Ok(json!({ "connection": context.connection_id, "echo": data }))
            }),
        )
        .add_socket_event(
            "user.fail",
            socket_listener(|_, _| async { Err(HttpError::bad_request("No user")) }),
        );
    Arc::new(registry)
}

fn context() -> SocketContext {
    SocketContext {
        connection_id: Uuid::nil(),
        session: None,
    }
}

#[tokio::test]
async fn test_registered_event_replies_under_same_name() {
    let reply = dispatch_inbound(
        &registry(),
        &context(),
        r#"{"event": "user.get", "data": {"id": 1}}"#,
    )
    .await
    .unwrap();
    assert_eq!(reply.event, "user.get");
    assert_eq!(reply.data["echo"], json!({ "id": 1 }));
}

#[tokio::test]
async fn test_listener_error_replies_with_error() {
    let reply = dispatch_inbound(&registry(), &context(), r#"{"event": "user.fail"}"#)
        .await
        .unwrap();
    assert_eq!(reply, SocketMessage::error("user.fail", "No user"));
}

#[tokio::test]
async fn test_unknown_and_malformed_frames_are_ignored() {
    let registry = registry();
    assert!(dispatch_inbound(&registry, &context(), r#"{"event": "user.delete"}"#)
        .await
        .is_none());
    assert!(dispatch_inbound(&registry, &context(), "not json").await.is_none());
}

#[tokio::test]
async fn test_handshake_reply() {
    let reply = dispatch_inbound(&registry(), &context(), r#"{"event": "handshake"}"#)
        .await
        .unwrap();
    assert_eq!(reply.event, "handshake");
    assert_eq!(reply.data["id"], json!(Uuid::nil()));
}

#[tokio::test]
async fn test_broadcast_reaches_every_subscriber() {
    let (tx, _) = tokio::sync::broadcast::channel(16);
    let tx: RealtimeEventBroadcast = tx;
    let mut first = tx.subscribe();
    let mut second = tx.subscribe();

    broadcast_event(&tx, RealtimeEvent::bundle_stats(json!({ "errors": [] })));
    assert_eq!(first.recv().await.unwrap().event, "bundle.stats");
    assert_eq!(second.recv().await.unwrap().event, "bundle.stats");
}
