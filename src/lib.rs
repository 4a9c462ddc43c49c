//! Pagewright - Main Library
//!
//! Pagewright is a server-side orchestrator for front-end applications. It
//! turns route, component and socket-event registrations into generated
//! bootstrap files consumed by a module bundler, drives the bundler, and
//! serves requests through an ordered middleware pipeline that resolves the
//! session, the user and the locale before rendering the page shell.
//!
//! # Module Structure
//!
//! - **`shared`** - Configuration and realtime event envelopes
//! - **`backend`** - Server-side code (only compiled with the `ssr` feature)
//!   - registry, artifact generator and bundle orchestrator
//!   - Axum request pipeline and route execution
//!   - WebSocket endpoint and build-stats broadcasting
//!
//! # Feature Flags
//!
//! - **`ssr`** (default) - enables the backend modules
//!
//! # Usage
//!
//! ```rust,no_run
//! use pagewright::backend::registry::{route_callback, Route, RouteOutcome};
//! use pagewright::backend::server::Server;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), pagewright::backend::error::ServerError> {
//! let mut server = Server::builder()
//!     .overrides(json!({"port": 8080, "dev": true}))
//!     .build()?;
//! server
//!     .registry_mut()
//!     .add_route(Route::get("/").component("pages/home").title("Home"))
//!     .add_route(Route::get("/health").callback(route_callback(|_| async {
//!         Ok(RouteOutcome::respond("ok"))
//!     })));
//! server.start().await?;
//! # Ok(())
//! # }
//! ```

/// Shared types and data structures
pub mod shared;

/// Backend server-side code
#[cfg(feature = "ssr")]
pub mod backend;
