//! Registry Module
//!
//! In-memory collections of everything the application registers: routes,
//! route callbacks, components, socket events and classes, plugins, middlewares,
//! before-execution hooks, entry injections and extra generated files.
//!
//! Registration methods return the registry itself so calls chain. The only
//! fallible registration is [`Registry::use_middleware`], which resolves a
//! middleware by name.
//!
//! After preparation the server freezes the registry into an `Arc` snapshot
//! that the artifact generator, the router and the realtime layer read from.

pub mod hooks;
pub mod plugin;
pub mod route;
pub mod spec;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::http::Method;
use futures_util::future::BoxFuture;

use crate::backend::error::RegistryError;
use crate::backend::logging::log_warn;
use crate::backend::middleware::{Middleware, MiddlewareEntry, MiddlewareFactory};
use crate::shared::AppConfig;

pub use hooks::{
    auth_hook, before_hook, error_hook, initial_data_hook, socket_listener, title_hook, AuthHook,
    BeforeHookFn, ErrorContext, ErrorHook, InitialDataHook, SocketContext, SocketListener,
    TitleHook,
};
pub use plugin::{Plugin, PluginFactories, PluginFactory};
pub use route::{
    legacy_route_callback, route_callback, route_key, Completion, LayoutRef, Route, RouteCallback,
    RouteOutcome, RouteRequest,
};
pub use spec::{PathSpec, WILDCARD_SPEC};

/// Front-end component mounted at a DOM anchor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Path of the component, relative to the app directory or absolute.
    pub path: String,
    pub element_id: String,
    /// Render an empty anchor element in the default layout.
    pub auto: bool,
}

#[derive(Clone)]
pub struct SocketEvent {
    pub event: String,
    pub listener: SocketListener,
}

impl fmt::Debug for SocketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketEvent").field("event", &self.event).finish()
    }
}

/// Socket listeners sharing one instance
///
/// Registering a class registers every event it returns. The listeners
/// usually capture the `Arc` of the class to reach its state.
pub trait SocketClass: Send + Sync {
    fn name(&self) -> &str;

    /// Events handled by the class with their listeners.
    fn events(self: Arc<Self>) -> Vec<(String, SocketListener)>;
}

#[derive(Clone)]
pub struct BeforeHook {
    pub spec: PathSpec,
    pub callback: BeforeHookFn,
}

impl fmt::Debug for BeforeHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeforeHook").field("spec", &self.spec.as_str()).finish()
    }
}

/// Content of an extra generated file
#[derive(Clone)]
pub enum GeneratedContent {
    Static(String),
    /// Evaluated when the artifacts are written.
    Lazy(Arc<dyn Fn() -> BoxFuture<'static, Result<String, String>> + Send + Sync>),
}

impl GeneratedContent {
    pub fn lazy<F, Fut>(content: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, String>> + Send + 'static,
    {
        Self::Lazy(Arc::new(move || Box::pin(content())))
    }
}

/// Extra file written into the generated directory
#[derive(Clone)]
pub struct GeneratedFile {
    pub filename: String,
    pub content: GeneratedContent,
}

impl fmt::Debug for GeneratedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.content {
            GeneratedContent::Static(_) => "static",
            GeneratedContent::Lazy(_) => "lazy",
        };
        f.debug_struct("GeneratedFile")
            .field("filename", &self.filename)
            .field("content", &kind)
            .finish()
    }
}

/// Registrations of the application
#[derive(Clone, Default)]
pub struct Registry {
    routes: Vec<Route>,
    route_callbacks: HashMap<String, RouteCallback>,
    components: Vec<Component>,
    socket_events: Vec<SocketEvent>,
    socket_classes: Vec<Arc<dyn SocketClass>>,
    plugins: Vec<Arc<dyn Plugin>>,
    middlewares: Vec<MiddlewareEntry>,
    middleware_factories: HashMap<String, MiddlewareFactory>,
    before_hooks: Vec<BeforeHook>,
    entry_injections: Vec<String>,
    generated_files: Vec<GeneratedFile>,
    error_page: Option<String>,
    component_provider: Option<String>,
    component_error_handler: Option<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(&mut self, route: Route) -> &mut Self {
        self.routes.push(route);
        self
    }

    /// Registers a callback for routes registered without component and
    /// callback under the same method and spec.
    pub fn add_route_callback(
        &mut self,
        method: Method,
        spec: &str,
        callback: RouteCallback,
    ) -> &mut Self {
        self.route_callbacks.insert(route_key(&method, spec), callback);
        self
    }

    pub fn add_component(
        &mut self,
        path: impl Into<String>,
        element_id: impl Into<String>,
        auto: bool,
    ) -> &mut Self {
        self.components.push(Component {
            path: path.into(),
            element_id: element_id.into(),
            auto,
        });
        self
    }

    pub fn add_socket_event(&mut self, event: impl Into<String>, listener: SocketListener) -> &mut Self {
        self.socket_events.push(SocketEvent {
            event: event.into(),
            listener,
        });
        self
    }

    pub fn add_socket_class(&mut self, class: Arc<dyn SocketClass>) -> &mut Self {
        for (event, listener) in class.clone().events() {
            self.add_socket_event(event, listener);
        }
        self.socket_classes.push(class);
        self
    }

    pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>, after_routes: bool) -> &mut Self {
        self.middlewares.push(MiddlewareEntry {
            middleware,
            after_routes,
        });
        self
    }

    pub fn register_middleware_factory(
        &mut self,
        name: impl Into<String>,
        factory: MiddlewareFactory,
    ) -> &mut Self {
        self.middleware_factories.insert(name.into(), factory);
        self
    }

    /// Adds the middleware built by the factory registered under `name`.
    pub fn use_middleware(&mut self, name: &str, after_routes: bool) -> Result<&mut Self, RegistryError> {
        let factory = self.middleware_factories.get(name).ok_or_else(|| {
            RegistryError::InvalidArgument(format!("The middleware '{name}' is not a registered middleware."))
        })?;
        let middleware = factory();
        Ok(self.add_middleware(middleware, after_routes))
    }

    /// Registers a hook run before every route matching `spec` (`*` for all
    /// routes). A second hook for the same spec replaces the first one.
    pub fn add_before_hook(&mut self, spec: &str, callback: BeforeHookFn) -> &mut Self {
        let parsed = match PathSpec::parse(spec) {
            Ok(parsed) => parsed,
            Err(e) => {
                log_warn!("Skipping before execution callback: {}", e);
                return self;
            }
        };
        if let Some(index) = self.before_hooks.iter().position(|h| h.spec.as_str() == spec) {
            log_warn!("Before execution callback for '{}' is already registered. Rewriting.", spec);
            self.before_hooks.remove(index);
        }
        self.before_hooks.push(BeforeHook {
            spec: parsed,
            callback,
        });
        self
    }

    pub fn add_plugin(&mut self, plugin: Arc<dyn Plugin>) -> &mut Self {
        self.plugins.push(plugin);
        self
    }

    /// Appends code to the generated entry file. Empty code is ignored.
    pub fn inject_to_entry(&mut self, code: impl Into<String>) -> &mut Self {
        let code = code.into();
        if !code.is_empty() {
            self.entry_injections.push(code);
        }
        self
    }

    pub fn add_generated_file(&mut self, filename: impl Into<String>, content: GeneratedContent) -> &mut Self {
        self.generated_files.push(GeneratedFile {
            filename: filename.into(),
            content,
        });
        self
    }

    pub fn set_error_page(&mut self, path: impl Into<String>) -> &mut Self {
        self.error_page = Some(path.into());
        self
    }

    pub fn set_component_provider(&mut self, path: impl Into<String>) -> &mut Self {
        self.component_provider = Some(path.into());
        self
    }

    pub fn set_component_error_handler(&mut self, path: impl Into<String>) -> &mut Self {
        self.component_error_handler = Some(path.into());
        self
    }

    /// Registers the routes, components and page overrides of the config.
    pub fn register_config_entries(&mut self, config: &AppConfig) -> &mut Self {
        for entry in &config.routes {
            let Some(method) = route::parse_method(&entry.method) else {
                log_warn!("Unknown method '{}' of route {}. Skipping.", entry.method, entry.route);
                continue;
            };
            let mut route = Route::new(method, entry.route.clone())
                .title(entry.title.clone())
                .require_auth(entry.require_auth);
            if let Some(component) = &entry.component {
                route = route.component(component.clone());
            }
            if let Some(layout) = &entry.layout {
                route = route.layout(LayoutRef::Named(layout.clone()));
            }
            if let Some(name) = &entry.callback {
                match self.route_callbacks.get(name) {
                    Some(callback) => route = route.callback(callback.clone()),
                    None => log_warn!("Route callback '{}' of {} is not registered.", name, entry.route),
                }
            }
            self.add_route(route);
        }
        for entry in &config.components {
            self.add_component(entry.path.clone(), entry.element_id.clone(), entry.auto);
        }
        if let Some(page) = &config.error_page {
            self.set_error_page(page.clone());
        }
        if let Some(page) = &config.error.page {
            self.set_error_page(page.clone());
        }
        if let Some(provider) = &config.component_provider {
            self.set_component_provider(provider.clone());
        }
        if let Some(handler) = &config.component_error_handler {
            self.set_component_error_handler(handler.clone());
        }
        self
    }

    /// Callback executed for `route`: its own, else the one registered in
    /// the route-callback map. The map only serves routes without a content
    /// component.
    pub fn resolve_callback(&self, route: &Route) -> Option<RouteCallback> {
        if route.callback.is_some() {
            return route.callback.clone();
        }
        if route.component.is_some() {
            return None;
        }
        self.route_callbacks.get(&route.key()).cloned()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn socket_events(&self) -> &[SocketEvent] {
        &self.socket_events
    }

    pub fn socket_listener(&self, event: &str) -> Option<SocketListener> {
        self.socket_events
            .iter()
            .find(|e| e.event == event)
            .map(|e| e.listener.clone())
    }

    pub fn socket_classes(&self) -> &[Arc<dyn SocketClass>] {
        &self.socket_classes
    }

    pub fn socket_class(&self, name: &str) -> Option<&Arc<dyn SocketClass>> {
        self.socket_classes.iter().find(|class| class.name() == name)
    }

    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.plugins
    }

    /// First registered plugin named `name`.
    pub fn plugin(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
        self.plugins.iter().find(|plugin| plugin.name() == name)
    }

    pub fn middlewares(&self) -> &[MiddlewareEntry] {
        &self.middlewares
    }

    pub fn before_hooks(&self) -> &[BeforeHook] {
        &self.before_hooks
    }

    pub fn entry_injections(&self) -> &[String] {
        &self.entry_injections
    }

    pub fn generated_files(&self) -> &[GeneratedFile] {
        &self.generated_files
    }

    pub fn error_page(&self) -> Option<&str> {
        self.error_page.as_deref()
    }

    pub fn component_provider(&self) -> Option<&str> {
        self.component_provider.as_deref()
    }

    pub fn component_error_handler(&self) -> Option<&str> {
        self.component_error_handler.as_deref()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("routes", &self.routes)
            .field("route_callbacks", &self.route_callbacks.keys().collect::<Vec<_>>())
            .field("components", &self.components)
            .field("socket_events", &self.socket_events)
            .field(
                "socket_classes",
                &self.socket_classes.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field("plugins", &self.plugins.iter().map(|p| p.name()).collect::<Vec<_>>())
            .field("middlewares", &self.middlewares.len())
            .field("before_hooks", &self.before_hooks)
            .field("entry_injections", &self.entry_injections)
            .field("generated_files", &self.generated_files)
            .finish()
    }
}
