//! Shared handler state
use crate::metrics::ApiMetrics;
use qc_runs::{
    MemoryRunStore, MemorySnapshotSource, OrchestratorConfig, OrchestratorContext, Run,
    RunOrchestrator,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: RunOrchestrator,
    pub metrics: Arc<ApiMetrics>,
}

impl AppState {
    pub fn new(orchestrator: RunOrchestrator) -> Result<Self, prometheus::Error> {
        Ok(Self {
            orchestrator,
            metrics: Arc::new(ApiMetrics::new()?),
        })
    }

    /// Single-process deployment over the in-memory store
    pub fn in_memory(
        config: OrchestratorConfig,
        snapshots: MemorySnapshotSource,
    ) -> Result<Self, prometheus::Error> {
        let ctx = OrchestratorContext::new(Arc::new(MemoryRunStore::new()), Arc::new(snapshots));
        Self::new(RunOrchestrator::new(ctx, config))
    }

    pub(crate) fn observe_run(&self, run: &Run) {
        if run.status.is_terminal() {
            self.metrics
                .runs
                .with_label_values(&[run.status.to_string().as_str()])
                .inc();
        }
    }
}
