/**
 * Router Configuration
 *
 * This module provides the main router creation function that combines
 * the service routes, the socket endpoint, user route dispatch and the
 * request pipeline into a single Axum router.
 *
 * # Route Order
 *
 * 1. Service routes (`/ping`, `/bundle-status`)
 * 2. Socket endpoint at the configured socket path
 * 3. Fallback: user routes in registration order, then post-route
 *    middlewares and 404
 *
 * # Layer Order
 *
 * `Router::layer` wraps everything added before it, so the stages are
 * applied innermost first. Requests pass them in the order documented in
 * [`crate::backend::middleware`].
 */
use std::sync::Arc;

use axum::{
    extract::Request,
    middleware::{from_fn, from_fn_with_state, Next as AxumNext},
    routing::get,
    Router,
};
use tower_http::compression::CompressionLayer;

use crate::backend::middleware::{
    auth::auth_middleware,
    bundling::bundling_gate_middleware,
    cookies::{cookie_policy_middleware, cookies_middleware, CookiePolicy},
    error::error_boundary_middleware,
    locale::locale_middleware,
    render::render_helper_middleware,
    run_user_middleware,
    session::session_middleware,
    static_files::{static_files_middleware, StaticFiles},
    Middleware,
};
use crate::backend::realtime::socket_handler;
use crate::backend::routes::execute::dispatch;
use crate::backend::routes::service::configure_service_routes;
use crate::backend::server::state::AppState;

/// Create the Axum router serving `app_state`
///
/// # Arguments
///
/// * `app_state` - Prepared application state (routes, registry, hooks)
///
/// # Returns
///
/// Configured Axum Router ready to serve requests
pub fn create_router(app_state: AppState) -> Router<()> {
    let config = app_state.config.clone();
    let static_files = StaticFiles::new(
        config.static_dir_absolute(),
        &config.bundle_path(),
        app_state.bundling.clone(),
    );
    let cookie_policy = Arc::new(CookiePolicy::from(&config.cookies));

    let mut router = configure_service_routes(Router::new())
        .route(&config.socket.path, get(socket_handler))
        .fallback(dispatch);

    // First registered runs first, so it is applied last.
    let pre_route: Vec<Arc<dyn Middleware>> = app_state
        .registry
        .middlewares()
        .iter()
        .filter(|entry| !entry.after_routes)
        .map(|entry| entry.middleware.clone())
        .collect();
    for middleware in pre_route.into_iter().rev() {
        router = router.layer(from_fn(move |request: Request, next: AxumNext| {
            run_user_middleware(middleware.clone(), request, next)
        }));
    }

    router
        .layer(from_fn_with_state(app_state.clone(), bundling_gate_middleware))
        .layer(from_fn_with_state(app_state.clone(), auth_middleware))
        .layer(from_fn_with_state(app_state.clone(), error_boundary_middleware))
        .layer(from_fn_with_state(
            app_state.renderer.clone(),
            render_helper_middleware,
        ))
        .layer(from_fn_with_state(app_state.clone(), locale_middleware))
        .layer(from_fn_with_state(app_state.clone(), session_middleware))
        .layer(from_fn_with_state(cookie_policy, cookie_policy_middleware))
        .layer(CompressionLayer::new())
        .layer(from_fn(cookies_middleware))
        .layer(from_fn_with_state(static_files, static_files_middleware))
        .with_state(app_state)
}
