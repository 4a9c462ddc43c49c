//! Request Pipeline Middleware
//!
//! Built-in stages, outermost first:
//!
//! 1. [`static_files`] - serves existing files of the static directory
//! 2. [`cookies`] - parses the `Cookie` header
//! 3. response compression
//! 4. [`cookies::cookie_policy_middleware`] - applies the cookie policy to `Set-Cookie`
//! 5. [`session`] - loads or creates the session of the signed cookie
//! 6. [`locale`] - resolves the request locale
//! 7. [`render`] - injects the layout renderer
//! 8. [`error`] - renders errors raised by the inner stages
//! 9. [`auth`] - runs the auth hook on the session
//! 10. [`bundling`] - holds requests while the first bundle is being built
//! 11. user middlewares registered before routes
//!
//! Requests no route matched run the user middlewares registered after
//! routes and end in a 404.

pub mod auth;
pub mod bundling;
pub mod cookies;
pub mod error;
pub mod locale;
pub mod render;
pub mod session;
pub mod static_files;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{extract::Request, response::Response};

use crate::backend::error::HttpError;

/// User middleware
///
/// Either returns a response itself or passes the request on with
/// `next.run(request)`.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, request: Request, next: Next) -> Response;
}

/// Registered middleware with its position relative to route dispatch
#[derive(Clone)]
pub struct MiddlewareEntry {
    pub middleware: Arc<dyn Middleware>,
    pub after_routes: bool,
}

impl MiddlewareEntry {
    pub fn before_routes(middleware: Arc<dyn Middleware>) -> Self {
        Self {
            middleware,
            after_routes: false,
        }
    }

    pub fn after_routes(middleware: Arc<dyn Middleware>) -> Self {
        Self {
            middleware,
            after_routes: true,
        }
    }
}

/// Builds a middleware registered by name.
pub type MiddlewareFactory = Arc<dyn Fn() -> Arc<dyn Middleware> + Send + Sync>;

/// Rest of the pipeline after a user middleware
pub struct Next {
    inner: NextInner,
}

enum NextInner {
    /// Pre-route position: the remaining layers and the router.
    Pipeline(axum::middleware::Next),
    /// Post-route position: the remaining post-route middlewares, then 404.
    Chain {
        chain: Arc<[Arc<dyn Middleware>]>,
        index: usize,
    },
}

impl Next {
    pub(crate) fn pipeline(next: axum::middleware::Next) -> Self {
        Self {
            inner: NextInner::Pipeline(next),
        }
    }

    pub(crate) fn chain(chain: Arc<[Arc<dyn Middleware>]>) -> Self {
        Self {
            inner: NextInner::Chain { chain, index: 0 },
        }
    }

    pub async fn run(self, request: Request) -> Response {
        match self.inner {
            NextInner::Pipeline(next) => next.run(request).await,
            NextInner::Chain { chain, index } => match chain.get(index).cloned() {
                Some(middleware) => {
                    let next = Next {
                        inner: NextInner::Chain {
                            chain,
                            index: index + 1,
                        },
                    };
                    middleware.handle(request, next).await
                }
                None => not_found(&request),
            },
        }
    }
}

fn not_found(request: &Request) -> Response {
    use axum::response::IntoResponse;
    HttpError::not_found(format!("Page {} not found.", request.uri().path())).into_response()
}

struct FnMiddleware<F> {
    handler: F,
}

#[async_trait]
impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync,
    Fut: Future<Output = Response> + Send + 'static,
{
    async fn handle(&self, request: Request, next: Next) -> Response {
        (self.handler)(request, next).await
    }
}

/// Wraps an async closure into a [`Middleware`].
pub fn middleware_fn<F, Fut>(handler: F) -> Arc<dyn Middleware>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(FnMiddleware { handler })
}

/// Runs a pre-route user middleware inside the axum layer stack.
pub(crate) async fn run_user_middleware(
    middleware: Arc<dyn Middleware>,
    request: Request,
    next: axum::middleware::Next,
) -> Response {
    middleware.handle(request, Next::pipeline(next)).await
}
