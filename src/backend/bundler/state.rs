use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Progress of the bundle orchestrator
///
/// Written only by the orchestrator; the bundling gate, the bundle-status
/// route and the realtime layer read it. Cloning shares the same state.
#[derive(Debug, Clone, Default)]
pub struct BundlingState {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    progress: AtomicU8,
    bundling: AtomicBool,
    completed_once: AtomicBool,
}

impl BundlingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Progress of the current pass (0 to 100).
    pub fn progress(&self) -> u8 {
        self.inner.progress.load(Ordering::Acquire)
    }

    pub fn is_bundling(&self) -> bool {
        self.inner.bundling.load(Ordering::Acquire)
    }

    /// True once any bundle operation has finished successfully.
    pub fn completed_once(&self) -> bool {
        self.inner.completed_once.load(Ordering::Acquire)
    }

    /// True while the first bundle is still being built.
    pub fn is_blocking(&self) -> bool {
        self.is_bundling() && !self.completed_once()
    }

    pub(crate) fn begin(&self) {
        self.inner.progress.store(0, Ordering::Release);
        self.inner.bundling.store(true, Ordering::Release);
    }

    pub(crate) fn set_progress(&self, percentage: u8) {
        self.inner.progress.store(percentage.min(100), Ordering::Release);
    }

    pub(crate) fn finish(&self) {
        self.inner.progress.store(100, Ordering::Release);
        self.inner.completed_once.store(true, Ordering::Release);
        self.inner.bundling.store(false, Ordering::Release);
    }

    pub(crate) fn fail(&self) {
        self.inner.bundling.store(false, Ordering::Release);
    }

    /// Marks the bundle as ready without building it.
    pub(crate) fn skip(&self) {
        self.inner.bundling.store(false, Ordering::Release);
        self.inner.completed_once.store(true, Ordering::Release);
    }
}
