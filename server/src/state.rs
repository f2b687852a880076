use memory::MemoryStore;
use metrics_exporter_prometheus::PrometheusHandle;
use reinforcement::RecommendationEngine;
use std::sync::Arc;
use supervisor::SessionRunner;

/// Shared handler state. Built once at startup; every handler sees the same
/// store, ledger and runner.
#[derive(Clone)]
pub struct AppState {
    /// `None` when the generation or captioning service is not configured.
    pub runner: Option<SessionRunner>,
    pub engine: Arc<RecommendationEngine>,
    pub metrics: Option<PrometheusHandle>
}

impl AppState {
    pub fn new(runner: Option<SessionRunner>, engine: Arc<RecommendationEngine>) -> Self {
        Self {
            runner,
            engine,
            metrics: None
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn memory(&self) -> &Arc<dyn MemoryStore> {
        self.engine.memory()
    }

    /// Flushes the memory store and the feedback ledger.
    pub async fn flush(&self) -> anyhow::Result<()> {
        self.memory().flush().await?;
        self.engine.ledger().flush().await?;
        Ok(())
    }
}
