//! Real-time Module
//!
//! Realtime socket endpoint and event broadcasting.
//!
//! # Architecture
//!
//! - **`broadcast`** - broadcast channel shared by every connection
//! - **`socket`** - WebSocket endpoint dispatching registered socket events
//!
//! # Events
//!
//! - `handshake` - sent on connect and answered on request
//! - registered events - dispatched to their listener, reply under the same name
//! - `bundle.stats` - broadcast after every bundler pass in dev mode

/// Event broadcasting utilities
pub mod broadcast;

/// WebSocket endpoint
pub mod socket;

// Re-export commonly used types and functions
pub use broadcast::{broadcast_event, RealtimeEventBroadcast};
pub use socket::{dispatch_inbound, socket_handler};
