//! Shared Module
//!
//! Types that do not depend on the HTTP server: the application
//! configuration and the realtime message envelope. They compile without the
//! `ssr` feature so tooling can read and validate configs on its own.

/// Application configuration
pub mod config;

/// Realtime socket envelopes
pub mod event;

pub use config::{AppConfig, ConfigError};
pub use event::{RealtimeEvent, SocketMessage};
