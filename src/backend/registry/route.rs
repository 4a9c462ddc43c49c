/**
 * Route Registrations
 *
 * A route pairs a method and path spec with a content component (rendered by
 * the client), a callback (run on the server) or both. Callbacks return a
 * future resolving to a `RouteOutcome`:
 *
 * - `Respond(response)` - the callback handled the request, nothing is rendered
 * - `Render(value)` - `value` is deep-merged into the page payload, which is
 *   then rendered through the layout
 *
 * Callback-style handlers are supported through [`legacy_route_callback`],
 * which hands out a single-use [`Completion`].
 */
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Bytes,
    http::{HeaderMap, Method, Uri},
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::backend::auth::Session;
use crate::backend::error::HttpError;
use crate::backend::logging::log_warn;
use crate::backend::middleware::render::Layout;

/// Result of a route callback
pub enum RouteOutcome {
    /// The callback produced the response itself.
    Respond(Response),
    /// Data deep-merged into the render payload.
    Render(Value),
}

impl RouteOutcome {
    pub fn respond(response: impl IntoResponse) -> Self {
        Self::Respond(response.into_response())
    }

    pub fn render(data: Value) -> Self {
        Self::Render(data)
    }
}

impl fmt::Debug for RouteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Respond(response) => f
                .debug_tuple("Respond")
                .field(&response.status())
                .finish(),
            Self::Render(value) => f.debug_tuple("Render").field(value).finish(),
        }
    }
}

/// Request data handed to route callbacks and hooks
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Path parameters captured by the route spec.
    pub params: HashMap<String, String>,
    /// Decoded query string.
    pub query: HashMap<String, String>,
    pub body: Bytes,
    pub session: Session,
    pub locale: String,
}

impl RouteRequest {
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Body parsed as JSON.
    pub fn json(&self) -> Result<Value, HttpError> {
        serde_json::from_slice(&self.body).map_err(|e| HttpError::bad_request(e.to_string()))
    }
}

pub type RouteCallback =
    Arc<dyn Fn(RouteRequest) -> BoxFuture<'static, Result<RouteOutcome, HttpError>> + Send + Sync>;

/// Wraps an async function into a [`RouteCallback`].
pub fn route_callback<F, Fut>(callback: F) -> RouteCallback
where
    F: Fn(RouteRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<RouteOutcome, HttpError>> + Send + 'static,
{
    Arc::new(move |request| Box::pin(callback(request)))
}

/// Single-use completion handed to callback-style routes.
///
/// Every method consumes the completion, so a route completes at most once.
/// Dropping it without completing answers the request with a 500.
pub struct Completion {
    sender: oneshot::Sender<Result<RouteOutcome, HttpError>>,
}

impl Completion {
    /// Render the page, merging `data` into the payload.
    pub fn render(self, data: Value) -> bool {
        self.complete(Ok(RouteOutcome::Render(data)))
    }

    /// Render the page without extra data.
    pub fn done(self) -> bool {
        self.render(Value::Null)
    }

    /// Send `response` as is.
    pub fn respond(self, response: impl IntoResponse) -> bool {
        self.complete(Ok(RouteOutcome::Respond(response.into_response())))
    }

    /// Fail the request with `error`.
    pub fn fail(self, error: HttpError) -> bool {
        self.complete(Err(error))
    }

    /// Returns false when the request is no longer waiting.
    pub fn complete(self, result: Result<RouteOutcome, HttpError>) -> bool {
        self.sender.send(result).is_ok()
    }
}

/// Adapts a callback-style handler into a [`RouteCallback`].
pub fn legacy_route_callback<F>(callback: F) -> RouteCallback
where
    F: Fn(RouteRequest, Completion) + Send + Sync + 'static,
{
    Arc::new(move |request| {
        log_warn!("Using callback functions in the route execution is deprecated. Return the outcome instead.");
        let (sender, receiver) = oneshot::channel();
        callback(request, Completion { sender });
        Box::pin(async move {
            receiver.await.unwrap_or_else(|_| {
                Err(HttpError::internal(
                    "Route callback finished without completing the request",
                ))
            })
        })
    })
}

/// Layout override of a route
#[derive(Clone)]
pub enum LayoutRef {
    /// Layout registered on the server under this name.
    Named(String),
    Instance(Arc<dyn Layout>),
}

impl LayoutRef {
    /// Identifier hashed into the client routing map.
    pub fn identifier(&self) -> String {
        match self {
            Self::Named(name) => name.clone(),
            Self::Instance(layout) => layout.name().to_string(),
        }
    }
}

impl fmt::Debug for LayoutRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Instance(layout) => f.debug_tuple("Instance").field(&layout.name()).finish(),
        }
    }
}

/// Registered route
#[derive(Clone)]
pub struct Route {
    pub method: Method,
    pub spec: String,
    /// Path of the page component, relative to the app directory or absolute.
    pub component: Option<String>,
    pub title: String,
    pub require_auth: bool,
    pub layout: Option<LayoutRef>,
    pub callback: Option<RouteCallback>,
}

impl Route {
    pub fn new(method: Method, spec: impl Into<String>) -> Self {
        Self {
            method,
            spec: spec.into(),
            component: None,
            title: String::new(),
            require_auth: false,
            layout: None,
            callback: None,
        }
    }

    pub fn get(spec: impl Into<String>) -> Self {
        Self::new(Method::GET, spec)
    }

    pub fn post(spec: impl Into<String>) -> Self {
        Self::new(Method::POST, spec)
    }

    pub fn component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn require_auth(mut self, require_auth: bool) -> Self {
        self.require_auth = require_auth;
        self
    }

    pub fn layout(mut self, layout: LayoutRef) -> Self {
        self.layout = Some(layout);
        self
    }

    pub fn callback(mut self, callback: RouteCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Key of the route in the route-callback map, e.g. `get /users`.
    pub fn key(&self) -> String {
        route_key(&self.method, &self.spec)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("spec", &self.spec)
            .field("component", &self.component)
            .field("title", &self.title)
            .field("require_auth", &self.require_auth)
            .field("layout", &self.layout)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

pub fn route_key(method: &Method, spec: &str) -> String {
    format!("{} {}", method.as_str().to_lowercase(), spec)
}

/// Parses a method name of a declarative route entry.
pub fn parse_method(method: &str) -> Option<Method> {
    match method.to_ascii_uppercase().as_str() {
        "GET" => Some(Method::GET),
        "POST" => Some(Method::POST),
        "PUT" => Some(Method::PUT),
        "DELETE" => Some(Method::DELETE),
        "PATCH" => Some(Method::PATCH),
        "HEAD" => Some(Method::HEAD),
        "OPTIONS" => Some(Method::OPTIONS),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) fn test_request(path: &str) -> RouteRequest {
    RouteRequest {
        method: Method::GET,
        uri: path.parse().unwrap_or_else(|_| Uri::from_static("/")),
        headers: HeaderMap::new(),
        params: HashMap::new(),
        query: HashMap::new(),
        body: Bytes::new(),
        session: Session::new("test"),
        locale: "en-US".to_string(),
    }
}
