/**
 * Server Initialization
 *
 * This module handles the construction, preparation and lifecycle of the
 * server.
 *
 * # Lifecycle
 *
 * 1. [`ServerBuilder::build`] loads and validates the configuration
 * 2. the application registers routes, components, socket events, plugins
 *    and middlewares through [`Server::registry_mut`]
 * 3. [`Server::prepare`] registers the plugins and the declarative entries,
 *    generates the bootstrap artifacts and creates the router
 * 4. [`Server::start`] bundles and opens the listener, in the order chosen
 *    by `bundleAfterServerStart`
 * 5. [`Server::stop`] stops watch mode and shuts the listener down gracefully
 *
 * # Error Handling
 *
 * Configuration, artifact and bundle errors abort start-up. A failing plugin
 * is logged and skipped.
 */
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use base64::Engine as _;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::backend::artifacts::ArtifactGenerator;
use crate::backend::auth::{MemorySessionStore, SessionStore};
use crate::backend::bundler::{
    BundleOrchestrator, BundlerEngine, BundlingState, CommandBundler, ConcatStyleCompiler,
    ProgressFn, StyleCompiler, StyleSources,
};
use crate::backend::error::ServerError;
use crate::backend::logging::{self, log_error, log_info, log_warn};
use crate::backend::middleware::render::{DefaultLayout, Layout, PageContext, Renderer};
use crate::backend::middleware::Middleware;
use crate::backend::realtime::broadcast::{self, RealtimeEventBroadcast};
use crate::backend::registry::{
    AuthHook, ErrorHook, InitialDataHook, LayoutRef, Plugin, PluginFactories, PluginFactory,
    Registry, TitleHook,
};
use crate::backend::routes::execute::PreparedRoute;
use crate::backend::routes::router::create_router;
use crate::backend::routes::service::is_service_path;
use crate::backend::server::config::listen_addr;
use crate::backend::server::state::{AppState, ServerHooks};
use crate::backend::text::Dictionaries;
use crate::shared::config::absolutize;
use crate::shared::AppConfig;

/// Name of the built-in session store.
pub const MEMORY_SESSION_STORE: &str = "memory";

/// Collects everything the server is constructed from
pub struct ServerBuilder {
    config_file: Option<PathBuf>,
    overrides: Value,
    config: Option<AppConfig>,
    layouts: HashMap<String, Arc<dyn Layout>>,
    session_stores: HashMap<String, Arc<dyn SessionStore>>,
    plugin_factories: PluginFactories,
    hooks: ServerHooks,
    engine: Option<Arc<dyn BundlerEngine>>,
    style_compiler: Option<Arc<dyn StyleCompiler>>,
    bundle_progress: Option<ProgressFn>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        let default_layout: Arc<dyn Layout> = Arc::new(DefaultLayout);
        let memory_store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        Self {
            config_file: None,
            overrides: Value::Object(Default::default()),
            config: None,
            layouts: HashMap::from([(default_layout.name().to_string(), default_layout)]),
            session_stores: HashMap::from([(MEMORY_SESSION_STORE.to_string(), memory_store)]),
            plugin_factories: PluginFactories::default(),
            hooks: ServerHooks::default(),
            engine: None,
            style_compiler: None,
            bundle_progress: None,
        }
    }
}

impl ServerBuilder {
    /// Declarative config file. Defaults to `./rsconfig.json` when present.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    /// Overrides deep-merged over the config file.
    pub fn overrides(mut self, overrides: Value) -> Self {
        self.overrides = overrides;
        self
    }

    /// Uses `config` as is instead of loading a config file.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Registers a layout under its name.
    pub fn layout(mut self, layout: Arc<dyn Layout>) -> Self {
        self.layouts.insert(layout.name().to_string(), layout);
        self
    }

    pub fn session_store(mut self, name: impl Into<String>, store: Arc<dyn SessionStore>) -> Self {
        self.session_stores.insert(name.into(), store);
        self
    }

    pub fn plugin_factory(mut self, name: impl Into<String>, factory: PluginFactory) -> Self {
        self.plugin_factories.insert(name, factory);
        self
    }

    /// Bundler engine. Defaults to a [`CommandBundler`] built from the config.
    pub fn bundler(mut self, engine: Arc<dyn BundlerEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Style compiler. Defaults to [`ConcatStyleCompiler`].
    pub fn style_compiler(mut self, compiler: Arc<dyn StyleCompiler>) -> Self {
        self.style_compiler = Some(compiler);
        self
    }

    /// Called with the bundler progress percentage of every compilation.
    pub fn on_bundle_progress(mut self, hook: ProgressFn) -> Self {
        self.bundle_progress = Some(hook);
        self
    }

    pub fn auth(mut self, hook: AuthHook) -> Self {
        self.hooks.auth = Some(hook);
        self
    }

    pub fn title(mut self, hook: TitleHook) -> Self {
        self.hooks.title = Some(hook);
        self
    }

    pub fn initial_data(mut self, hook: InitialDataHook) -> Self {
        self.hooks.initial_data = Some(hook);
        self
    }

    pub fn error_handler(mut self, hook: ErrorHook) -> Self {
        self.hooks.error = Some(hook);
        self
    }

    /// Loads and validates the configuration.
    pub fn build(self) -> Result<Server, ServerError> {
        let (config, warnings) = match self.config {
            Some(mut config) => {
                let warnings = config.normalize();
                config.validate()?;
                (config, warnings)
            }
            None => AppConfig::load(self.config_file.as_deref(), self.overrides)?,
        };

        if !self.layouts.contains_key(&config.layout) {
            return Err(ServerError::configuration(format!(
                "Layout '{}' is not registered.",
                config.layout
            )));
        }
        let sessions = self.session_stores.get(&config.session).cloned().ok_or_else(|| {
            ServerError::configuration(format!(
                "Session store '{}' is not registered.",
                config.session
            ))
        })?;
        if is_service_path(&config.socket.path) {
            return Err(ServerError::configuration(format!(
                "Socket path '{}' collides with a service route.",
                config.socket.path
            )));
        }
        let plugins = config
            .plugins
            .iter()
            .map(|entry| entry.resolve())
            .collect::<Result<Vec<_>, _>>()?;

        let engine = self
            .engine
            .unwrap_or_else(|| Arc::new(CommandBundler::from_config(&config)));
        let style_compiler = self
            .style_compiler
            .unwrap_or_else(|| Arc::new(ConcatStyleCompiler));
        let dictionaries = Dictionaries::load(&config);

        Ok(Server {
            config: Arc::new(config),
            warnings,
            registry: Registry::new(),
            declarative_plugins: plugins,
            plugin_factories: self.plugin_factories,
            layouts: Arc::new(self.layouts),
            sessions,
            hooks: self.hooks,
            engine,
            style_compiler,
            bundle_progress: self.bundle_progress,
            nonce: create_nonce(),
            bundling: BundlingState::new(),
            realtime: broadcast::channel(),
            dictionaries,
            state: None,
            orchestrator: None,
            listener: None,
        })
    }
}

/// Running HTTP listener
struct Listener {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

pub struct Server {
    config: Arc<AppConfig>,
    warnings: Vec<String>,
    registry: Registry,
    declarative_plugins: Vec<(String, Option<Value>)>,
    plugin_factories: PluginFactories,
    layouts: Arc<HashMap<String, Arc<dyn Layout>>>,
    sessions: Arc<dyn SessionStore>,
    hooks: ServerHooks,
    engine: Arc<dyn BundlerEngine>,
    style_compiler: Arc<dyn StyleCompiler>,
    bundle_progress: Option<ProgressFn>,
    nonce: String,
    bundling: BundlingState,
    realtime: RealtimeEventBroadcast,
    dictionaries: Dictionaries,
    state: Option<AppState>,
    orchestrator: Option<Arc<BundleOrchestrator>>,
    listener: Option<Listener>,
}

/// Nonce allowing the generated inline scripts.
fn create_nonce() -> String {
    base64::engine::general_purpose::STANDARD.encode(Uuid::new_v4().simple().to_string())
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registrations made after [`Server::prepare`] have no effect.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Registered plugin named `name`.
    pub fn plugin_by_name(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.registry.plugin(name).cloned()
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    pub fn bundling_state(&self) -> &BundlingState {
        &self.bundling
    }

    pub fn realtime(&self) -> &RealtimeEventBroadcast {
        &self.realtime
    }

    /// Bundle path in the website structure.
    pub fn bundle_path(&self) -> String {
        self.config.bundle_path()
    }

    pub fn bundle_path_absolute(&self) -> PathBuf {
        self.config.bundle_path_absolute()
    }

    /// Address of the running listener.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().map(|listener| listener.addr)
    }

    /// Dictionary text of `key` in `locale`; `$0..$n` are replaced by `args`.
    pub fn locale_text(&self, locale: &str, key: &str, args: &[&str]) -> String {
        self.dictionaries.get(locale, key, args)
    }

    /// Registers plugins and declarative entries, generates the bootstrap
    /// artifacts and creates the router. Later calls return a router over
    /// the same state.
    pub async fn prepare(&mut self) -> Result<Router, ServerError> {
        if let Some(state) = &self.state {
            return Ok(create_router(state.clone()));
        }
        logging::configure(self.config.logging, self.config.dev);
        for warning in &self.warnings {
            log_warn!("[Server] {}", warning);
        }

        self.create_declarative_plugins();
        let plugin_styles = self.register_plugins();
        self.registry.register_config_entries(&self.config);

        let artifacts = ArtifactGenerator::new(&self.config, &self.registry, &self.nonce)
            .generate()
            .await?;
        self.dictionaries = Dictionaries::load(&self.config);

        let registry = Arc::new(self.registry.clone());
        let mut routes = Vec::with_capacity(artifacts.routes.len());
        for route in artifacts.routes {
            let callback = registry.resolve_callback(&route);
            let layout = match &route.layout {
                Some(layout) => Some(self.resolve_layout(layout)?),
                None => None,
            };
            routes.push(Arc::new(PreparedRoute::new(route, callback, layout)?));
        }
        let after_routes: Vec<Arc<dyn Middleware>> = registry
            .middlewares()
            .iter()
            .filter(|entry| entry.after_routes)
            .map(|entry| entry.middleware.clone())
            .collect();

        let page = PageContext {
            bundle_path: self.config.bundle_path(),
            styles_path: self.config.styles_path(),
            scripts: self.config.scripts.clone(),
            styles: self.config.styles.clone(),
            nonce: self.nonce.clone(),
            auto_components: registry
                .components()
                .iter()
                .filter(|component| component.auto)
                .map(|component| component.element_id.clone())
                .collect(),
        };
        let default_layout = self.resolve_layout(&LayoutRef::Named(self.config.layout.clone()))?;
        let error_layout = match &self.config.error.layout {
            Some(name) => Some(self.resolve_layout(&LayoutRef::Named(name.clone()))?),
            None => None,
        };

        self.orchestrator = Some(Arc::new(self.create_orchestrator(plugin_styles)));
        let state = AppState {
            config: self.config.clone(),
            registry,
            routes: routes.into(),
            after_routes: after_routes.into(),
            bundling: self.bundling.clone(),
            sessions: self.sessions.clone(),
            hooks: self.hooks.clone(),
            layouts: self.layouts.clone(),
            renderer: Renderer::new(Arc::new(page), default_layout),
            error_layout,
            realtime: self.realtime.clone(),
        };
        log_info!("[Server] Prepared {} route(s)", state.routes.len());
        self.state = Some(state.clone());
        Ok(create_router(state))
    }

    fn create_declarative_plugins(&mut self) {
        for (name, options) in std::mem::take(&mut self.declarative_plugins) {
            match self.plugin_factories.create(&name, options) {
                Ok(plugin) => {
                    self.registry.add_plugin(plugin);
                }
                Err(e) => log_error!("[Server] Plugin {} failed: {}", name, e),
            }
        }
    }

    /// Registers every plugin and returns their stylesheets.
    fn register_plugins(&mut self) -> Vec<PathBuf> {
        let plugins: Vec<Arc<dyn Plugin>> = self.registry.plugins().to_vec();
        let mut styles = Vec::new();
        for plugin in plugins {
            if let Err(e) = plugin.register(&mut self.registry) {
                log_error!("[Server] Plugin {} failed: {}", plugin.name(), e);
                continue;
            }
            for code in plugin.entry_injections() {
                self.registry.inject_to_entry(code);
            }
            for entry in plugin.middlewares() {
                self.registry.add_middleware(entry.middleware, entry.after_routes);
            }
            styles.extend(plugin.styles());
            log_info!("[Server] Plugin {}@{} registered", plugin.name(), plugin.version());
        }
        styles
    }

    fn resolve_layout(&self, layout: &LayoutRef) -> Result<Arc<dyn Layout>, ServerError> {
        match layout {
            LayoutRef::Named(name) => self.layouts.get(name).cloned().ok_or_else(|| {
                ServerError::configuration(format!("Layout '{name}' is not registered."))
            }),
            LayoutRef::Instance(layout) => Ok(layout.clone()),
        }
    }

    fn create_orchestrator(&self, plugin_styles: Vec<PathBuf>) -> BundleOrchestrator {
        let mut sources: Vec<PathBuf> = self
            .config
            .merge_styles
            .iter()
            .map(|path| absolutize(path))
            .collect();
        sources.extend(plugin_styles);
        if let Some(dir) = &self.config.source_styles_dir {
            sources.push(absolutize(dir));
        }
        let orchestrator = BundleOrchestrator::new(
            self.engine.clone(),
            self.style_compiler.clone(),
            StyleSources {
                sources,
                output_dir: self.config.styles_dir(),
            },
            self.bundling.clone(),
            self.realtime.clone(),
        )
        .with_aggregate_timeout(Duration::from_millis(self.config.bundler.aggregate_timeout_ms));
        match &self.bundle_progress {
            Some(hook) => orchestrator.with_progress_hook(hook.clone()),
            None => orchestrator,
        }
    }

    fn orchestrator(&self) -> Result<Arc<BundleOrchestrator>, ServerError> {
        self.orchestrator
            .clone()
            .ok_or_else(|| ServerError::configuration("Server is not prepared."))
    }

    /// Manual production build.
    pub async fn bundle(&mut self) -> Result<(), ServerError> {
        if self.config.dev {
            log_warn!("[Bundler] Bundling in DEV mode is not permitted. Switching to production.");
            Arc::make_mut(&mut self.config).dev = false;
            if let Some(state) = &mut self.state {
                state.config = self.config.clone();
            }
        }
        self.prepare().await?;
        self.orchestrator()?.build().await?;
        Ok(())
    }

    /// Bundles and listens on the configured port.
    pub async fn start(&mut self) -> Result<SocketAddr, ServerError> {
        let listener = TcpListener::bind(listen_addr(&self.config)).await?;
        self.start_on(listener).await
    }

    /// Bundles and serves on `listener`.
    pub async fn start_on(&mut self, listener: TcpListener) -> Result<SocketAddr, ServerError> {
        let router = self.prepare().await?;
        let orchestrator = self.orchestrator()?;
        let dev = self.config.dev;
        if self.config.bundle_after_server_start {
            // Hold the bundle path back from the first request on.
            self.bundling.begin();
            let addr = self.serve(listener, router)?;
            if let Err(e) = orchestrator.bundle(dev).await {
                self.stop().await;
                return Err(e.into());
            }
            Ok(addr)
        } else {
            orchestrator.bundle(dev).await?;
            self.serve(listener, router)
        }
    }

    /// Serves on the configured port without bundling.
    pub async fn start_without_bundle(&mut self) -> Result<SocketAddr, ServerError> {
        let listener = TcpListener::bind(listen_addr(&self.config)).await?;
        self.start_without_bundle_on(listener).await
    }

    pub async fn start_without_bundle_on(
        &mut self,
        listener: TcpListener,
    ) -> Result<SocketAddr, ServerError> {
        let router = self.prepare().await?;
        self.bundling.skip();
        self.serve(listener, router)
    }

    fn serve(&mut self, listener: TcpListener, router: Router) -> Result<SocketAddr, ServerError> {
        let addr = listener.local_addr()?;
        let (shutdown, signal) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = signal.await;
                })
                .await
        });
        log_info!("[Server] Listening on {}", addr);
        self.listener = Some(Listener {
            addr,
            shutdown,
            task,
        });
        Ok(addr)
    }

    /// Stops watch mode and the listener.
    pub async fn stop(&mut self) {
        if let Some(orchestrator) = &self.orchestrator {
            orchestrator.stop();
        }
        let Some(listener) = self.listener.take() else {
            return;
        };
        let _ = listener.shutdown.send(());
        match listener.task.await {
            Ok(Ok(())) => log_info!("[Server] Stopped listening on {}", listener.addr),
            Ok(Err(e)) => log_error!("[Server] Listener failed: {}", e),
            Err(e) => log_error!("[Server] Listener task failed: {}", e),
        }
    }
}
