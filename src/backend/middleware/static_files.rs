/**
 * Static Files
 *
 * Outermost stage. Serves `GET`/`HEAD` requests naming an existing file of
 * the static directory through `tower_http::services::ServeDir`; everything
 * else passes through. The client bundle is held back while the first
 * bundle is still being built, so a stale bundle is never served.
 */
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::backend::bundler::BundlingState;

/// State of the static-file stage
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: Arc<PathBuf>,
    /// URL path of the client bundle, with a leading slash.
    bundle_path: Arc<str>,
    bundling: BundlingState,
}

impl StaticFiles {
    pub fn new(root: PathBuf, bundle_path: &str, bundling: BundlingState) -> Self {
        let bundle_path = format!("/{}", bundle_path.trim_start_matches('/'));
        Self {
            root: Arc::new(root),
            bundle_path: Arc::from(bundle_path),
            bundling,
        }
    }

    /// File of the static directory named by `path`, when one exists.
    pub fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative.as_os_str().is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        let file = self.root.join(relative);
        file.is_file().then_some(file)
    }
}

pub async fn static_files_middleware(
    State(files): State<StaticFiles>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::GET && request.method() != Method::HEAD {
        return next.run(request).await;
    }
    let path = request.uri().path();
    if path == &*files.bundle_path && files.bundling.is_blocking() {
        return next.run(request).await;
    }
    if files.resolve(path).is_none() {
        return next.run(request).await;
    }
    match ServeDir::new(files.root.as_path()).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}
