/**
 * Bundling Gate
 *
 * While the first bundle is being built the client bundle does not exist
 * yet, so pages cannot boot. Requests are answered with
 * `503 Service Unavailable` and a `Retry-After` header until the first pass
 * completes. The service routes and the socket endpoint stay reachable.
 */
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::backend::routes::service::{BUNDLE_STATUS_PATH, PING_PATH};
use crate::backend::server::state::AppState;

/// Seconds clients are asked to wait before retrying.
pub const RETRY_AFTER_SECS: &str = "1";

pub fn is_allowed_while_bundling(path: &str, socket_path: &str) -> bool {
    path == PING_PATH || path == BUNDLE_STATUS_PATH || path == socket_path
}

pub async fn bundling_gate_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if state.bundling.is_blocking()
        && !is_allowed_while_bundling(request.uri().path(), &state.config.socket.path)
    {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, RETRY_AFTER_SECS)],
            format!("Bundling in progress ({}%).", state.bundling.progress()),
        )
            .into_response();
    }
    next.run(request).await
}
