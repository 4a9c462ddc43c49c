//! Route Configuration Module
//!
//! This module configures all HTTP routes of the server.
//!
//! # Architecture
//!
//! - **`router`** - router creation and pipeline assembly
//! - **`service`** - built-in service routes
//! - **`execute`** - user route dispatch and the per-route execution steps
//!
//! # Module Structure
//!
//! ```text
//! routes/
//! ├── mod.rs          - Module exports and documentation
//! ├── router.rs       - Main router creation
//! ├── service.rs      - /ping and /bundle-status
//! └── execute.rs      - User route dispatch
//! ```
//!
//! # Route Types
//!
//! - `GET /ping` - `pong`
//! - `GET /bundle-status` - bundling progress
//! - `GET <socket path>` - realtime socket
//! - user routes - everything the registry declares, first match wins

/// Main router creation
pub mod router;

/// Built-in service routes
pub mod service;

/// User route dispatch
pub mod execute;

// Re-export commonly used functions
pub use execute::{execute_route, PreparedRoute};
pub use router::create_router;
