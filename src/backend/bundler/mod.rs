//! Bundle Orchestrator
//!
//! Drives the bundler engine and sequences style compilation.
//!
//! # Modes
//!
//! - **Production** - one compilation; compile errors reject the bundle,
//!   otherwise the styles are compiled once.
//! - **Development** - styles are compiled, then the engine watches the app.
//!   Every compilation is broadcast as `bundle.stats`; compilations after
//!   the first one recompile the styles. Readiness resolves on the first
//!   compilation, even one with compile errors. An engine failure before
//!   that rejects it.
//!
//! Style recompilation only happens on the task consuming watch events, so
//! it never overlaps with itself.

pub mod engine;
pub mod state;
pub mod styles;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::backend::error::BundleError;
use crate::backend::logging::{log_error, log_info, log_warn};
use crate::backend::realtime::broadcast::{broadcast_event, RealtimeEventBroadcast};
use crate::shared::RealtimeEvent;

pub use engine::{BundleStats, BundlerEngine, CommandBundler, ProgressFn, WatchHandle};
pub use state::BundlingState;
pub use styles::{compile_styles, ConcatStyleCompiler, StyleCompiler, StyleSources};

pub struct BundleOrchestrator {
    engine: Arc<dyn BundlerEngine>,
    styles: Arc<dyn StyleCompiler>,
    style_sources: Arc<StyleSources>,
    state: BundlingState,
    realtime: RealtimeEventBroadcast,
    aggregate_timeout: Duration,
    progress_hook: Option<ProgressFn>,
    watch_task: Mutex<Option<JoinHandle<()>>>,
}

impl BundleOrchestrator {
    pub fn new(
        engine: Arc<dyn BundlerEngine>,
        styles: Arc<dyn StyleCompiler>,
        style_sources: StyleSources,
        state: BundlingState,
        realtime: RealtimeEventBroadcast,
    ) -> Self {
        Self {
            engine,
            styles,
            style_sources: Arc::new(style_sources),
            state,
            realtime,
            aggregate_timeout: Duration::from_millis(500),
            progress_hook: None,
            watch_task: Mutex::new(None),
        }
    }

    pub fn with_aggregate_timeout(mut self, timeout: Duration) -> Self {
        self.aggregate_timeout = timeout;
        self
    }

    /// Called with every progress percentage reported by the engine.
    pub fn with_progress_hook(mut self, hook: ProgressFn) -> Self {
        self.progress_hook = Some(hook);
        self
    }

    pub fn state(&self) -> &BundlingState {
        &self.state
    }

    /// Bundles in watch mode when `dev`, once otherwise.
    pub async fn bundle(&self, dev: bool) -> Result<(), BundleError> {
        if dev {
            self.watch().await
        } else {
            self.build().await.map(|_| ())
        }
    }

    fn progress(&self) -> ProgressFn {
        let state = self.state.clone();
        let hook = self.progress_hook.clone();
        Arc::new(move |percentage| {
            state.set_progress(percentage);
            if let Some(hook) = &hook {
                hook(percentage);
            }
        })
    }

    /// Progress of watch mode; a rebuild marks the state as bundling again.
    fn watch_progress(&self) -> ProgressFn {
        let state = self.state.clone();
        let hook = self.progress_hook.clone();
        Arc::new(move |percentage| {
            if percentage < 100 && !state.is_bundling() {
                state.begin();
            }
            state.set_progress(percentage);
            if let Some(hook) = &hook {
                hook(percentage);
            }
        })
    }

    /// Production build.
    pub async fn build(&self) -> Result<BundleStats, BundleError> {
        self.state.begin();
        log_info!("[Bundler] Starting bundler");
        let result = self.run_build().await;
        match &result {
            Ok(stats) => {
                log_info!("[Bundler] Bundle finished in {} ms", stats.duration_ms);
                self.state.finish();
            }
            Err(e) => {
                log_error!("[Bundler] {}", e);
                self.state.fail();
            }
        }
        result
    }

    async fn run_build(&self) -> Result<BundleStats, BundleError> {
        let stats = self.engine.run(self.progress()).await?;
        if stats.has_errors() {
            return Err(BundleError::Compile {
                errors: stats.errors,
            });
        }
        compile_styles(self.styles.as_ref(), &self.style_sources).await?;
        Ok(stats)
    }

    /// Starts watch mode and resolves after the first compilation.
    pub async fn watch(&self) -> Result<(), BundleError> {
        self.state.begin();
        if let Err(e) = compile_styles(self.styles.as_ref(), &self.style_sources).await {
            self.state.fail();
            return Err(e);
        }
        log_info!("[Bundler] Starting bundler in watch mode");
        let handle = match self.engine.watch(self.watch_progress(), self.aggregate_timeout).await {
            Ok(handle) => handle,
            Err(e) => {
                self.state.fail();
                return Err(e);
            }
        };

        let (ready_tx, ready_rx) = oneshot::channel();
        let task = tokio::spawn(consume_watch_events(
            handle,
            ready_tx,
            self.styles.clone(),
            self.style_sources.clone(),
            self.state.clone(),
            self.realtime.clone(),
        ));
        if let Some(previous) = self.watch_task.lock().replace(task) {
            previous.abort();
        }

        match ready_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.stop();
                Err(e)
            }
            Err(_) => {
                self.state.fail();
                Err(BundleError::WatchStopped)
            }
        }
    }

    /// Stops watch mode, if running.
    pub fn stop(&self) {
        if let Some(task) = self.watch_task.lock().take() {
            log_info!("[Bundler] Stopping watch mode");
            task.abort();
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watch_task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for BundleOrchestrator {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn consume_watch_events(
    mut handle: WatchHandle,
    ready: oneshot::Sender<Result<(), BundleError>>,
    styles: Arc<dyn StyleCompiler>,
    style_sources: Arc<StyleSources>,
    state: BundlingState,
    realtime: RealtimeEventBroadcast,
) {
    let mut ready = Some(ready);
    let mut compilations = 0usize;
    while let Some(result) = handle.events.recv().await {
        compilations += 1;
        match result {
            Ok(stats) => {
                if stats.has_errors() {
                    log_error!("[Bundler] Compilation failed: {}", stats.errors.join("; "));
                }
                if compilations > 1 {
                    if let Err(e) = compile_styles(styles.as_ref(), &style_sources).await {
                        log_error!("[Bundler] {}", e);
                    }
                }
                state.finish();
                match serde_json::to_value(&stats) {
                    Ok(value) => {
                        broadcast_event(&realtime, RealtimeEvent::bundle_stats(value));
                    }
                    Err(e) => log_error!("[Bundler] Cannot serialize bundle stats: {}", e),
                }
            }
            Err(e) => {
                log_error!("[Bundler] {}", e);
                state.fail();
                if let Some(ready) = ready.take() {
                    let _ = ready.send(Err(e));
                    return;
                }
            }
        }
        if let Some(ready) = ready.take() {
            let _ = ready.send(Ok(()));
        }
    }
    log_warn!("[Bundler] Watch mode stopped");
}
