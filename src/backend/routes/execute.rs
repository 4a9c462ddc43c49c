/**
 * Route Execution
 *
 * User routes are matched in registration order by the router fallback, so
 * that specs with differing parameter names or wildcards never conflict.
 * A matched route runs through:
 *
 * 1. `401` when the route requires a user and the session has none
 * 2. before-execution hooks (wildcard hooks always, scoped hooks on a path
 *    match), sequentially; the first failure aborts the request
 * 3. layout resolution (route override, else the default layout)
 * 4. the title and initial-data hooks
 * 5. payload `{title, data: {user, dev, timestamp, version, locale, ..., envVars}}`
 * 6. no callback: render; callback: respond as returned, or merge the
 *    returned data into the payload and render
 *
 * Requests no route matched run the post-route user middlewares and end in
 * a 404.
 */
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::{
    body::to_bytes,
    extract::{Query, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use uuid::Uuid;

use crate::backend::auth::Session;
use crate::backend::error::{HttpError, RegistryError};
use crate::backend::logging::log_warn;
use crate::backend::middleware::locale::Locale;
use crate::backend::middleware::render::{Layout, RenderPayload, Renderer};
use crate::backend::middleware::Next;
use crate::backend::registry::{PathSpec, Route, RouteCallback, RouteOutcome, RouteRequest};
use crate::backend::server::state::AppState;

/// Route ready for dispatch
pub struct PreparedRoute {
    pub route: Route,
    pub spec: PathSpec,
    /// Own callback or the one found in the route-callback map.
    pub callback: Option<RouteCallback>,
    /// Layout override; `None` renders with the default layout.
    pub layout: Option<Arc<dyn Layout>>,
}

impl PreparedRoute {
    pub fn new(
        route: Route,
        callback: Option<RouteCallback>,
        layout: Option<Arc<dyn Layout>>,
    ) -> Result<Self, RegistryError> {
        let spec = PathSpec::parse(&route.spec)?;
        Ok(Self {
            route,
            spec,
            callback,
            layout,
        })
    }
}

impl fmt::Debug for PreparedRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedRoute")
            .field("route", &self.route)
            .field("layout", &self.layout.as_ref().map(|l| l.name().to_string()))
            .finish()
    }
}

/// Router fallback: dispatches to the first matching user route.
pub async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    let matched = state.routes.iter().find_map(|prepared| {
        if prepared.route.method != *request.method() {
            return None;
        }
        prepared
            .spec
            .matches(&path)
            .map(|params| (prepared.clone(), params))
    });

    let Some((route, params)) = matched else {
        return Next::chain(state.after_routes.clone()).run(request).await;
    };

    let renderer = request
        .extensions()
        .get::<Renderer>()
        .cloned()
        .unwrap_or_else(|| state.renderer.clone());
    let route_request = match route_request(&state, request, params).await {
        Ok(route_request) => route_request,
        Err(e) => return e.into_response(),
    };
    match execute_route(&state, &route, route_request, &renderer).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn route_request(
    state: &AppState,
    request: Request,
    params: HashMap<String, String>,
) -> Result<RouteRequest, HttpError> {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, state.config.body_limit)
        .await
        .map_err(|e| HttpError::new(StatusCode::PAYLOAD_TOO_LARGE, e.to_string()))?;
    let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
        .map(|Query(query)| query)
        .unwrap_or_default();
    let session = parts
        .extensions
        .get::<Session>()
        .cloned()
        .unwrap_or_else(|| Session::new(Uuid::new_v4().to_string()));
    let locale = parts
        .extensions
        .get::<Locale>()
        .map(|l| l.0.clone())
        .unwrap_or_else(|| state.config.locale.default.clone());

    Ok(RouteRequest {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        params,
        query,
        body,
        session,
        locale,
    })
}

/// Runs the execution steps of `route` for `request`.
pub async fn execute_route(
    state: &AppState,
    route: &PreparedRoute,
    request: RouteRequest,
    renderer: &Renderer,
) -> Result<Response, HttpError> {
    if route.route.require_auth && request.session.user().is_none() {
        return Err(HttpError::unauthorized());
    }

    for hook in state.registry.before_hooks() {
        if hook.spec.is_wildcard() || hook.spec.matches(request.path()).is_some() {
            (hook.callback)(request.clone()).await?;
        }
    }

    let title = match &state.hooks.title {
        Some(hook) => hook(request.clone())
            .await?
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| route.route.title.clone()),
        None => route.route.title.clone(),
    };
    let additional = match &state.hooks.initial_data {
        Some(hook) => hook(request.clone()).await?,
        None => Value::Null,
    };
    if !additional.is_null() && !additional.is_object() {
        log_warn!(
            "Initial data of {} is not an object. Ignoring.",
            request.path()
        );
    }

    let data = state.page_data(request.session.user(), &request.locale, additional);
    let mut payload = RenderPayload::new(title, data);

    if let Some(callback) = &route.callback {
        match callback(request).await? {
            RouteOutcome::Respond(response) => return Ok(response),
            RouteOutcome::Render(extra) => payload.merge(extra)?,
        }
    }
    Ok(renderer.render(route.layout.as_ref(), &payload))
}
