/**
 * Error Rendering Boundary
 *
 * Every `HttpError` turned into a response inside this stage carries the
 * error as a response extension. The boundary replaces such responses with
 * the final error rendering:
 *
 * 1. the custom error hook, when it returns a response
 * 2. a JSON body when the request accepts `application/json`
 * 3. the error layout (`error.layout`) or the default layout, with the error
 *    in the page data
 *
 * Server errors are logged.
 */
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde_json::json;

use crate::backend::auth::Session;
use crate::backend::error::{json_error_response, HttpError};
use crate::backend::logging::log_error;
use crate::backend::middleware::locale::Locale;
use crate::backend::middleware::render::RenderPayload;
use crate::backend::registry::ErrorContext;
use crate::backend::server::state::AppState;

pub async fn error_boundary_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let context = ErrorContext {
        uri: request.uri().clone(),
        headers: request.headers().clone(),
        session: request.extensions().get::<Session>().cloned(),
        locale: request.extensions().get::<Locale>().map(|l| l.0.clone()),
    };
    let response = next.run(request).await;
    let Some(error) = response.extensions().get::<HttpError>().cloned() else {
        return response;
    };
    if error.status.is_server_error() {
        log_error!("[Server] {} {}", context.uri, error);
    }
    render_error(&state, error, context).await
}

/// Renders `error` the way the boundary does.
pub async fn render_error(state: &AppState, error: HttpError, context: ErrorContext) -> Response {
    if let Some(hook) = &state.hooks.error {
        if let Some(response) = hook(error.clone(), context.clone()).await {
            return response;
        }
    }
    if accepts_json(&context.headers) {
        return json_error_response(&error);
    }

    let locale = context
        .locale
        .clone()
        .unwrap_or_else(|| state.config.locale.default.clone());
    let user = context.session.as_ref().and_then(Session::user);
    let data = state.page_data(
        user,
        &locale,
        json!({
            "error": {
                "status": error.status.as_u16(),
                "message": error.message,
                "data": error.data,
            }
        }),
    );
    let payload = RenderPayload::new(error.message.clone(), data);
    let mut response = state.renderer.render(state.error_layout.as_ref(), &payload);
    *response.status_mut() = error.status;
    response
}

fn accepts_json(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.contains("application/json"))
}
