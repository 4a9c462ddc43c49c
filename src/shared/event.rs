/**
 * Realtime Event Envelope
 *
 * Every frame exchanged over the realtime socket is a JSON envelope
 * `{event, data}`. Outbound broadcasts additionally carry a timestamp.
 */
use serde::{Deserialize, Serialize};

/// Event sent to every connection right after it is accepted.
pub const HANDSHAKE_EVENT: &str = "handshake";

/// Event broadcasting the stats of a finished bundler pass.
pub const BUNDLE_STATS_EVENT: &str = "bundle.stats";

/// Inbound or outbound socket message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SocketMessage {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl SocketMessage {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Error reply for `event`.
    pub fn error(event: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(event, serde_json::json!({ "error": message.into() }))
    }
}

/// Real-time event that can be broadcast to all connected sockets
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealtimeEvent {
    /// Event name
    pub event: String,
    /// Event payload (JSON-serializable data)
    pub data: serde_json::Value,
    /// Timestamp when event occurred
    pub timestamp: String,
}

impl RealtimeEvent {
    /// Create a new real-time event
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Create a bundle stats event
    pub fn bundle_stats(stats: serde_json::Value) -> Self {
        Self::new(BUNDLE_STATS_EVENT, stats)
    }

    /// Envelope sent over the wire
    pub fn to_message(&self) -> SocketMessage {
        SocketMessage::new(self.event.clone(), self.data.clone())
    }

    /// Serialize event to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_message())
    }
}
