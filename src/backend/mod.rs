//! Backend Module
//!
//! All server-side code: the registry, the artifact generator, the bundle
//! orchestrator, the request pipeline and the realtime layer.
//!
//! This module is only compiled when the `ssr` feature is enabled.
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs          - Module exports and documentation
//! ├── server/         - Server construction, state and lifecycle
//! ├── registry/       - Routes, components, socket events, plugins, hooks
//! ├── artifacts/      - Generated bootstrap files
//! ├── bundler/        - Bundler engine, style compilation, bundling state
//! ├── routes/         - Router assembly, service routes, route execution
//! ├── middleware/     - Request pipeline stages
//! ├── realtime/       - Socket endpoint and event broadcasting
//! ├── auth/           - Sessions and the signed session cookie
//! ├── text.rs         - Locale dictionaries
//! ├── logging.rs      - Process-wide logging switch
//! └── error/          - Error types
//! ```
//!
//! # Thread Safety
//!
//! The prepared registry is shared as an `Arc` snapshot. Sessions and the
//! bundling state carry their own locks and atomics; no lock is held across
//! an `.await`.

/// Generated bootstrap files
pub mod artifacts;

/// Sessions
pub mod auth;

/// Bundler engine and orchestration
pub mod bundler;

/// Backend error types
pub mod error;

/// Logging switch
pub mod logging;

/// Request pipeline stages
pub mod middleware;

/// Real-time update system
pub mod realtime;

/// Registrations
pub mod registry;

/// Route configuration
pub mod routes;

/// Server setup and lifecycle
pub mod server;

/// Locale dictionaries
pub mod text;

pub use error::{HttpError, ServerError};
pub use realtime::{broadcast_event, RealtimeEventBroadcast};
pub use registry::{Registry, Route, RouteOutcome, SocketClass};
pub use server::{Server, ServerBuilder};
