//! Backend Error Module
//!
//! Error types of the server, grouped by layer.
//!
//! # Module Structure
//!
//! ```text
//! error/
//! ├── mod.rs        - Module exports and documentation
//! ├── types.rs      - Error type definitions
//! └── conversion.rs - IntoResponse and conversions between layers
//! ```
//!
//! # HTTP Response Conversion
//!
//! `HttpError` implements `IntoResponse` from Axum. The error rendering
//! boundary in [`crate::backend::middleware::error`] turns it into the final
//! error page.

/// Error type definitions
pub mod types;

/// Error conversion implementations
pub mod conversion;

// Re-export commonly used types
pub use conversion::json_error_response;
pub use types::{ArtifactError, BundleError, HttpError, RegistryError, ServerError};
