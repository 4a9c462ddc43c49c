/**
 * Real-time Event Broadcasting
 *
 * Events are broadcast using `tokio::sync::broadcast`. Every socket
 * connection holds a receiver, so a broadcast reaches all currently
 * connected clients. Delivery is not acknowledged.
 */
use tokio::sync::broadcast;

use crate::backend::logging::log_info;
use crate::shared::RealtimeEvent;

/// Capacity of the broadcast channel
pub const BROADCAST_CAPACITY: usize = 1000;

/// Real-time update event broadcast
///
/// Cloned into the application state and the bundle orchestrator.
pub type RealtimeEventBroadcast = broadcast::Sender<RealtimeEvent>;

pub fn channel() -> RealtimeEventBroadcast {
    broadcast::channel(BROADCAST_CAPACITY).0
}

/// Broadcast a real-time event to all connected sockets
///
/// # Returns
///
/// Number of connections that received the event (0 if none)
pub fn broadcast_event(broadcast_tx: &RealtimeEventBroadcast, event: RealtimeEvent) -> usize {
    let name = event.event.clone();
    match broadcast_tx.send(event) {
        Ok(subscriber_count) => {
            log_info!("[Realtime] Event {} broadcast to {} sockets", name, subscriber_count);
            subscriber_count
        }
        Err(_) => {
            tracing::debug!("[Realtime] No sockets to receive event {}", name);
            0
        }
    }
}
