/**
 * Backend Error Types
 *
 * One error enum per layer:
 *
 * - `HttpError` - per-request failures rendered by the error boundary
 * - `RegistryError` - invalid registrations
 * - `ArtifactError` - generated file rendering and writing
 * - `BundleError` - bundler engine and style compilation
 * - `ServerError` - construction, preparation and start-up
 *
 * Request-level errors carry their HTTP status. Everything else is fatal for
 * the operation that produced it and surfaces to the caller of
 * `Server::prepare`, `Server::start` or `Server::bundle`.
 */
use axum::http::StatusCode;
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

use crate::shared::ConfigError;

/// Per-request error with an HTTP status
///
/// Returned from route callbacks, hooks and middlewares. The error boundary
/// renders it through the custom error handler, as JSON or through the error
/// layout.
///
/// # Example
///
/// ```rust
/// use pagewright::backend::error::HttpError;
///
/// let err = HttpError::not_found("No such page");
/// assert_eq!(err.status.as_u16(), 404);
/// ```
#[derive(Debug, Clone, Error)]
#[error("{status}: {message}")]
pub struct HttpError {
    /// HTTP status code for this error
    pub status: StatusCode,
    /// Human-readable error message
    pub message: String,
    /// Optional payload exposed to the error page
    pub data: Option<Value>,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: None,
        }
    }

    /// Attach data exposed to the error page.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    /// Get the error message
    pub fn message(&self) -> String {
        self.message.clone()
    }
}

/// Registration errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A registration received a value it cannot use, e.g. an unknown
    /// middleware name.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Generated file errors
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Lazily generated content failed to evaluate.
    #[error("Cannot generate {filename}: {message}")]
    Generated { filename: String, message: String },
}

impl ArtifactError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Bundling errors
#[derive(Debug, Error)]
pub enum BundleError {
    /// The bundler finished but reported compile errors.
    #[error("Bundle failed with {} error(s): {}", errors.len(), errors.join("; "))]
    Compile { errors: Vec<String> },

    /// The bundler engine could not run.
    #[error("Bundler engine error: {0}")]
    Engine(String),

    #[error("Bundler I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Watch mode ended before the first compilation finished.
    #[error("Bundler watch stopped before the first compilation")]
    WatchStopped,

    /// Style compilation failed.
    #[error("Style compilation failed: {0}")]
    Styles(String),
}

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid construction input (unknown layout, session store, plugin).
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_constructors() {
        let error = HttpError::unauthorized();
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);

        let error = HttpError::not_found("Missing");
        match error {
            HttpError { status, message, data } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(message, "Missing");
                assert!(data.is_none());
            }
        }
    }

    #[test]
    fn test_http_error_with_data() {
        let error = HttpError::internal("Boom").with_data(serde_json::json!({"id": 1}));
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.data, Some(serde_json::json!({"id": 1})));
    }

    #[test]
    fn test_compile_error_message() {
        let error = BundleError::Compile {
            errors: vec!["a.tsx: syntax".to_string(), "b.tsx: type".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "Bundle failed with 2 error(s): a.tsx: syntax; b.tsx: type"
        );
    }

    #[test]
    fn test_server_error_from_bundle_error() {
        let error: ServerError = BundleError::WatchStopped.into();
        match error {
            ServerError::Bundle(BundleError::WatchStopped) => {}
            _ => panic!("Expected ServerError::Bundle"),
        }
    }
}
