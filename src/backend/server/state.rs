/**
 * Application State Management
 *
 * This module defines the application state structure and implements
 * the necessary `FromRef` traits for Axum state extraction.
 *
 * # Architecture
 *
 * The `AppState` struct is built once by `Server::prepare` and holds:
 * - the normalized configuration
 * - the frozen registry snapshot and the routes kept by the artifact generator
 * - the bundling state written by the bundle orchestrator
 * - the session store, server hooks and registered layouts
 * - the broadcast channel for realtime events
 *
 * Nothing in the state is mutated per request except the sessions, which
 * carry their own locks.
 */
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::FromRef;
use serde_json::{json, Map, Value};

use crate::backend::auth::SessionStore;
use crate::backend::bundler::BundlingState;
use crate::backend::middleware::render::{Layout, Renderer};
use crate::backend::middleware::Middleware;
use crate::backend::realtime::broadcast::RealtimeEventBroadcast;
use crate::backend::registry::{
    AuthHook, ErrorHook, InitialDataHook, LayoutRef, Registry, TitleHook,
};
use crate::backend::routes::execute::PreparedRoute;
use crate::shared::AppConfig;

/// Server-wide hooks configured on the builder
#[derive(Clone, Default)]
pub struct ServerHooks {
    /// Resolves the user of every session.
    pub auth: Option<AuthHook>,
    /// Per-request page title.
    pub title: Option<TitleHook>,
    /// Per-request initial page data.
    pub initial_data: Option<InitialDataHook>,
    /// Custom error rendering.
    pub error: Option<ErrorHook>,
}

/// Application state shared by every request handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<Registry>,
    /// Routes served over HTTP, in registration order.
    pub routes: Arc<[Arc<PreparedRoute>]>,
    /// User middlewares run when no route matched.
    pub after_routes: Arc<[Arc<dyn Middleware>]>,
    pub bundling: BundlingState,
    pub sessions: Arc<dyn SessionStore>,
    pub hooks: ServerHooks,
    pub layouts: Arc<HashMap<String, Arc<dyn Layout>>>,
    pub renderer: Renderer,
    /// Layout of error pages. `None` renders them with the default layout.
    pub error_layout: Option<Arc<dyn Layout>>,
    pub realtime: RealtimeEventBroadcast,
}

impl AppState {
    /// Secret signing the session cookie. Set during config normalization.
    pub fn cookie_secret(&self) -> &str {
        self.config.cookies.secret.as_deref().unwrap_or_default()
    }

    pub fn layout(&self, layout: &LayoutRef) -> Option<Arc<dyn Layout>> {
        match layout {
            LayoutRef::Named(name) => self.layouts.get(name).cloned(),
            LayoutRef::Instance(layout) => Some(layout.clone()),
        }
    }

    /// Base `data` of every rendered page.
    ///
    /// `additional` must be an object; its keys override the base keys
    /// except `envVars`.
    pub fn page_data(&self, user: Option<Value>, locale: &str, additional: Value) -> Value {
        let mut data = Map::new();
        data.insert("user".to_string(), user.unwrap_or(Value::Null));
        data.insert("dev".to_string(), Value::Bool(self.config.dev));
        data.insert("timestamp".to_string(), json!(timestamp_millis()));
        data.insert("version".to_string(), Value::String(self.config.app_version()));
        data.insert("locale".to_string(), Value::String(locale.to_string()));
        if let Value::Object(additional) = additional {
            data.extend(additional);
        }
        data.insert(
            "envVars".to_string(),
            Value::Object(self.config.env_vars.clone()),
        );
        Value::Object(data)
    }
}

fn timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Implement FromRef for Renderer
///
/// Used by the render-helper stage.
impl FromRef<AppState> for Renderer {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.renderer.clone()
    }
}

/// Implement FromRef for BundlingState
///
/// This allows the bundle-status route to extract the bundling state
/// directly from `AppState`.
impl FromRef<AppState> for BundlingState {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.bundling.clone()
    }
}

/// Implement FromRef for RealtimeEventBroadcast
///
/// This allows Axum handlers to extract the real-time event broadcast
/// sender directly from `AppState`.
impl FromRef<AppState> for RealtimeEventBroadcast {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.realtime.clone()
    }
}

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.config.clone()
    }
}
