//! Server Module
//!
//! Construction, preparation and lifecycle of the server.
//!
//! # Module Structure
//!
//! ```text
//! server/
//! ├── mod.rs          - Module exports and documentation
//! ├── state.rs        - AppState and FromRef implementations
//! ├── config.rs       - Configuration loading for the server binary
//! └── init.rs         - Server builder, preparation, start and stop
//! ```
//!
//! # Initialization Flow
//!
//! 1. **Construction**: the builder loads the configuration and rejects
//!    unknown layouts, session stores and malformed plugin entries
//! 2. **Registration**: the application fills the registry
//! 3. **Preparation**: plugins and declarative entries are registered, the
//!    bootstrap artifacts generated and the router created
//! 4. **Start**: bundling and the listener, in the configured order
//!
//! # Example
//!
//! ```rust,no_run
//! use pagewright::backend::registry::Route;
//! use pagewright::backend::server::Server;
//!
//! # async fn example() -> Result<(), pagewright::backend::error::ServerError> {
//! let mut server = Server::builder().build()?;
//! server
//!     .registry_mut()
//!     .add_route(Route::get("/").component("pages/home").title("Home"));
//! server.start().await?;
//! # Ok(())
//! # }
//! ```

/// Application state management
pub mod state;

/// Configuration loading for the server binary
pub mod config;

/// Server construction and lifecycle
pub mod init;

pub use init::{Server, ServerBuilder};
pub use state::{AppState, ServerHooks};
