//! Scripted bundler engine.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pagewright::backend::bundler::{BundleStats, BundlerEngine, ProgressFn, WatchHandle};
use pagewright::backend::error::BundleError;
use tokio::sync::{mpsc, Notify};

/// Engine reporting fixed progress and stats.
///
/// With a gate, `run` and the first watch compilation wait for it to be
/// notified before finishing.
#[derive(Default)]
pub struct MockBundler {
    pub progress: u8,
    pub errors: Vec<String>,
    pub gate: Option<Arc<Notify>>,
}

impl MockBundler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated(progress: u8) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let bundler = Self {
            progress,
            errors: Vec::new(),
            gate: Some(gate.clone()),
        };
        (bundler, gate)
    }

    fn stats(&self) -> BundleStats {
        BundleStats {
            errors: self.errors.clone(),
            warnings: Vec::new(),
            duration_ms: 1,
        }
    }
}

#[async_trait]
impl BundlerEngine for MockBundler {
    async fn run(&self, progress: ProgressFn) -> Result<BundleStats, BundleError> {
        progress(self.progress);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        Ok(self.stats())
    }

    async fn watch(
        &self,
        progress: ProgressFn,
        _aggregate_timeout: Duration,
    ) -> Result<WatchHandle, BundleError> {
        progress(self.progress);
        let (tx, rx) = mpsc::channel(1);
        let stats = self.stats();
        let gate = self.gate.clone();
        let task = tokio::spawn(async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if tx.send(Ok(stats)).await.is_ok() {
                std::future::pending::<()>().await;
            }
        });
        Ok(WatchHandle::new(rx, task))
    }
}
