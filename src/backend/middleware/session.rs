/**
 * Session Middleware
 *
 * Loads the session named by the signed `session_id` cookie. Requests
 * without a valid cookie get a fresh session id, and the signed cookie is
 * appended to the response. The session is saved after the response only
 * when it was modified.
 */
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::backend::auth::sessions::{
    sign_session_id, verify_session_token, Session, SESSION_COOKIE_NAME, SESSION_TTL_SECS,
};
use crate::backend::logging::log_error;
use crate::backend::middleware::cookies::{set_cookie_value, RequestCookies};
use crate::backend::server::state::AppState;

pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let secret = state.cookie_secret().to_string();
    let existing = request
        .extensions()
        .get::<RequestCookies>()
        .and_then(|cookies| cookies.get(SESSION_COOKIE_NAME))
        .and_then(|token| verify_session_token(token, &secret).ok());

    let (session_id, fresh) = match existing {
        Some(id) => (id, false),
        None => (Uuid::new_v4().to_string(), true),
    };
    let stored = if fresh {
        None
    } else {
        state.sessions.load(&session_id).await
    };
    let session = stored.unwrap_or_else(|| Session::new(session_id.clone()));
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;
    if session.is_modified() {
        state.sessions.save(&session).await;
    }
    if fresh {
        let cookie = sign_session_id(&session_id, &secret)
            .map_err(|e| e.to_string())
            .and_then(|token| {
                HeaderValue::from_str(&set_cookie_value(
                    SESSION_COOKIE_NAME,
                    &token,
                    Some(SESSION_TTL_SECS),
                ))
                .map_err(|e| e.to_string())
            });
        match cookie {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => log_error!("[Server] Failed to sign the session cookie: {}", e),
        }
    }
    response
}
