/**
 * Service Routes
 *
 * Routes registered before any user route:
 *
 * - `GET /ping` - liveness check answering `pong`
 * - `GET /bundle-status` - progress of the current bundle pass (0 to 100)
 */
use axum::{extract::State, routing::get, Router};

use crate::backend::bundler::BundlingState;
use crate::backend::server::state::AppState;

pub const PING_PATH: &str = "/ping";
pub const BUNDLE_STATUS_PATH: &str = "/bundle-status";

/// True when a user route spec would shadow a service route.
pub fn is_service_path(spec: &str) -> bool {
    spec == PING_PATH || spec == BUNDLE_STATUS_PATH
}

pub fn configure_service_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route(PING_PATH, get(ping))
        .route(BUNDLE_STATUS_PATH, get(bundle_status))
}

pub async fn ping() -> &'static str {
    "pong"
}

pub async fn bundle_status(State(bundling): State<BundlingState>) -> String {
    bundling.progress().to_string()
}
