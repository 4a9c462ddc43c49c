//! Hook and listener signatures.
//!
//! Every hook is an `Arc`'d async closure returning a boxed future; the
//! helper constructors accept plain async closures.

use std::future::Future;
use std::sync::Arc;

use axum::{
    http::{HeaderMap, Uri},
    response::Response,
};
use futures_util::future::BoxFuture;
use serde_json::Value;
use uuid::Uuid;

use super::route::RouteRequest;
use crate::backend::auth::Session;
use crate::backend::error::HttpError;

/// Runs before a matching route executes. An error aborts the request.
pub type BeforeHookFn =
    Arc<dyn Fn(RouteRequest) -> BoxFuture<'static, Result<(), HttpError>> + Send + Sync>;

/// Resolves the user of a session, e.g. by calling `session.set_user`.
pub type AuthHook = Arc<dyn Fn(Session) -> BoxFuture<'static, Result<(), HttpError>> + Send + Sync>;

/// Per-request page title. `None` keeps the route title.
pub type TitleHook =
    Arc<dyn Fn(RouteRequest) -> BoxFuture<'static, Result<Option<String>, HttpError>> + Send + Sync>;

/// Extra initial page data merged into `data`.
pub type InitialDataHook =
    Arc<dyn Fn(RouteRequest) -> BoxFuture<'static, Result<Value, HttpError>> + Send + Sync>;

/// Custom error rendering. `None` falls back to the built-in rendering.
pub type ErrorHook =
    Arc<dyn Fn(HttpError, ErrorContext) -> BoxFuture<'static, Option<Response>> + Send + Sync>;

/// Handles one inbound socket event and returns the reply data.
pub type SocketListener =
    Arc<dyn Fn(SocketContext, Value) -> BoxFuture<'static, Result<Value, HttpError>> + Send + Sync>;

/// Request data available to the error hook
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub uri: Uri,
    pub headers: HeaderMap,
    pub session: Option<Session>,
    pub locale: Option<String>,
}

/// Connection data available to socket listeners
#[derive(Debug, Clone)]
pub struct SocketContext {
    pub connection_id: Uuid,
    pub session: Option<Session>,
}

pub fn before_hook<F, Fut>(hook: F) -> BeforeHookFn
where
    F: Fn(RouteRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HttpError>> + Send + 'static,
{
    Arc::new(move |request| Box::pin(hook(request)))
}

pub fn auth_hook<F, Fut>(hook: F) -> AuthHook
where
    F: Fn(Session) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HttpError>> + Send + 'static,
{
    Arc::new(move |session| Box::pin(hook(session)))
}

pub fn title_hook<F, Fut>(hook: F) -> TitleHook
where
    F: Fn(RouteRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<String>, HttpError>> + Send + 'static,
{
    Arc::new(move |request| Box::pin(hook(request)))
}

pub fn initial_data_hook<F, Fut>(hook: F) -> InitialDataHook
where
    F: Fn(RouteRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HttpError>> + Send + 'static,
{
    Arc::new(move |request| Box::pin(hook(request)))
}

pub fn error_hook<F, Fut>(hook: F) -> ErrorHook
where
    F: Fn(HttpError, ErrorContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<Response>> + Send + 'static,
{
    Arc::new(move |error, context| Box::pin(hook(error, context)))
}

pub fn socket_listener<F, Fut>(listener: F) -> SocketListener
where
    F: Fn(SocketContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HttpError>> + Send + 'static,
{
    Arc::new(move |context, data| Box::pin(listener(context, data)))
}
