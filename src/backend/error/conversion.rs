/**
 * Error Conversion
 *
 * `HttpError` implements `IntoResponse`, so route callbacks, hooks and
 * middlewares can return it directly. The response carries the error itself
 * as a response extension; the error boundary picks it up and renders the
 * final error page.
 *
 * # Response Format
 *
 * Without the boundary (or when it falls back) the body is JSON:
 * ```json
 * {
 *   "error": "Error message",
 *   "status": 400
 * }
 * ```
 */
use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::backend::error::types::{HttpError, ServerError};

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = json_error_response(&self);
        response.extensions_mut().insert(self);
        response
    }
}

/// Plain JSON body for `error`, without the boundary marker.
pub fn json_error_response(error: &HttpError) -> Response {
    let status = error.status_code();
    let mut body = serde_json::json!({
        "error": error.message,
        "status": status.as_u16(),
    });
    if let Some(data) = &error.data {
        body["data"] = data.clone();
    }

    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}

impl From<ServerError> for HttpError {
    fn from(error: ServerError) -> Self {
        HttpError::internal(error.to_string())
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(error: serde_json::Error) -> Self {
        HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }
}
