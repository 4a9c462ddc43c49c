/**
 * Authentication Middleware
 *
 * Runs the auth hook of the server on the session of every request, so that
 * the hook can resolve the signed-in user with `session.set_user`. A failing
 * hook aborts the request with its error. Routes with `require_auth` then
 * check the user during route execution.
 */
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::backend::auth::Session;
use crate::backend::server::state::AppState;

pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(hook) = &state.hooks.auth {
        if let Some(session) = request.extensions().get::<Session>().cloned() {
            if let Err(e) = hook(session).await {
                return e.into_response();
            }
        }
    }
    next.run(request).await
}

