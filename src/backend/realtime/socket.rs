/**
 * Realtime Socket Endpoint
 *
 * WebSocket endpoint mounted at the configured socket path. Frames are JSON
 * envelopes `{event, data}`.
 *
 * # Connection Lifecycle
 *
 * 1. The connection is greeted with a `handshake` event carrying its id
 * 2. Inbound events are dispatched to the registered listener; the result
 *    (or `{error}`) is sent back under the same event name
 * 3. Broadcast events (bundle stats) are forwarded as they arrive
 * 4. The loop ends when the client closes or the channel shuts down
 */
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    Extension,
};
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::backend::auth::Session;
use crate::backend::logging::{log_info, log_warn};
use crate::backend::registry::{Registry, SocketContext};
use crate::backend::server::state::AppState;
use crate::shared::event::{SocketMessage, HANDSHAKE_EVENT};

/// Upgrade handler of the socket path
pub async fn socket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    session: Option<Extension<Session>>,
) -> Response {
    let context = SocketContext {
        connection_id: Uuid::new_v4(),
        session: session.map(|Extension(session)| session),
    };
    let max_size = state.config.socket.message_max_size;
    ws.max_message_size(max_size)
        .on_upgrade(move |socket| handle_socket(socket, state, context))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, context: SocketContext) {
    log_info!("[Realtime] Socket {} connected", context.connection_id);
    let handshake = SocketMessage::new(HANDSHAKE_EVENT, json!({ "id": context.connection_id }));
    if send(&mut socket, &handshake).await.is_err() {
        return;
    }

    let registry = state.registry.clone();
    let mut events = state.realtime.subscribe();
    loop {
        tokio::select! {
            inbound = socket.recv() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = dispatch_inbound(&registry, &context, text.as_str()).await {
                        if send(&mut socket, &reply).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    log_warn!("[Realtime] Socket {} error: {}", context.connection_id, e);
                    break;
                }
            },
            event = events.recv() => match event {
                Ok(event) => {
                    if send(&mut socket, &event.to_message()).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log_warn!("[Realtime] Socket {} lagged, skipped {} events", context.connection_id, skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    log_info!("[Realtime] Socket {} disconnected", context.connection_id);
}

async fn send(socket: &mut WebSocket, message: &SocketMessage) -> Result<(), axum::Error> {
    match serde_json::to_string(message) {
        Ok(text) => socket.send(Message::Text(text.into())).await,
        Err(e) => {
            tracing::error!("[Realtime] Failed to serialize socket message: {:?}", e);
            Ok(())
        }
    }
}

/// Handles one inbound frame and returns the reply, if any.
pub async fn dispatch_inbound(
    registry: &Arc<Registry>,
    context: &SocketContext,
    text: &str,
) -> Option<SocketMessage> {
    let message: SocketMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            log_warn!("[Realtime] Invalid socket message: {}", e);
            return None;
        }
    };

    if message.event == HANDSHAKE_EVENT {
        return Some(SocketMessage::new(
            HANDSHAKE_EVENT,
            json!({ "id": context.connection_id }),
        ));
    }

    let Some(listener) = registry.socket_listener(&message.event) else {
        log_warn!("[Realtime] Socket event {} is not registered.", message.event);
        return None;
    };
    match listener(context.clone(), message.data).await {
        Ok(data) => Some(SocketMessage::new(message.event, data)),
        Err(e) => Some(SocketMessage::error(message.event, e.message)),
    }
}
