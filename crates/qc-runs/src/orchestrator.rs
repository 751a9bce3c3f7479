//! Run orchestrator
//!
//! Drives one run through QUEUED → RUNNING → SUCCEEDED | FAILED. All
//! collaborators come from an explicit [`OrchestratorContext`]; nothing is
//! global. Any failure after RUNNING is converted once into a customer-safe
//! error on the run, with the internal detail logged only.

use crate::aggregate::{aggregate, SegmentEvaluation};
use crate::audit::{AuditAction, AuditEntry, TracingAuditSink};
use crate::collaborators::{
    AuditSink, ConnectorRegistry, InputLoader, MemoryInputLoader, MemorySecretAccessor,
    SecretAccessor, SignalSource, SnapshotSource,
};
use crate::config::OrchestratorConfig;
use crate::error::RunError;
use crate::input::{load_input, LoadedInput};
use crate::mapper::{map_results, RuleCounts, RuleResultRecord};
use crate::persist::{ResultBundle, WritePlan};
use crate::result::{
    result_id_for, segment_id_for, Integrity, ResultDocument, ResultSummary, SegmentRecord,
    SegmentationInfo, WriteState,
};
use crate::run::{Run, RunRequest, RunStatus, RunUpdate};
use crate::store::{RunStore, StoreError};
use chrono::{DateTime, Utc};
use qc_core::{AiSignals, NormalizedInput};
use qc_engine::{evaluate, OverallOutcome, RuleSnapshot, RunSummary};
use qc_segment::Segmenter;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Store attempts to move a faulted run from RUNNING to FAILED
const FAIL_TRANSITION_ATTEMPTS: usize = 2;

/// Collaborators available to the orchestrator
#[derive(Clone)]
pub struct OrchestratorContext {
    pub store: Arc<dyn RunStore>,
    pub snapshots: Arc<dyn SnapshotSource>,
    pub input_loader: Arc<dyn InputLoader>,
    pub secrets: Arc<dyn SecretAccessor>,
    pub connectors: ConnectorRegistry,
    pub audit: Arc<dyn AuditSink>,
    pub signals: Option<Arc<dyn SignalSource>>,
}

impl OrchestratorContext {
    /// Context with in-memory loaders, no connectors, tracing audit and no
    /// signal source
    pub fn new(store: Arc<dyn RunStore>, snapshots: Arc<dyn SnapshotSource>) -> Self {
        Self {
            store,
            snapshots,
            input_loader: Arc::new(MemoryInputLoader::new()),
            secrets: Arc::new(MemorySecretAccessor::new()),
            connectors: ConnectorRegistry::new(),
            audit: Arc::new(TracingAuditSink),
            signals: None,
        }
    }

    pub fn with_input_loader(mut self, loader: Arc<dyn InputLoader>) -> Self {
        self.input_loader = loader;
        self
    }

    pub fn with_secrets(mut self, secrets: Arc<dyn SecretAccessor>) -> Self {
        self.secrets = secrets;
        self
    }

    pub fn with_connectors(mut self, connectors: ConnectorRegistry) -> Self {
        self.connectors = connectors;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_signals(mut self, signals: Arc<dyn SignalSource>) -> Self {
        self.signals = Some(signals);
        self
    }
}

/// What a successful execution produced, for logging and audit
#[derive(Debug, Clone, PartialEq)]
struct Execution {
    result_id: String,
    outcome: OverallOutcome,
    score: f64,
    segment_count: usize,
    two_phase: bool,
}

/// Evaluated result before persistence
struct Evaluated {
    summary: ResultSummary,
    records: Vec<RuleResultRecord>,
    segments: Vec<(SegmentRecord, Vec<RuleResultRecord>)>,
    segmentation: Option<SegmentationInfo>,
}

#[derive(Clone)]
pub struct RunOrchestrator {
    ctx: Arc<OrchestratorContext>,
    config: OrchestratorConfig,
    segmenter: Segmenter,
}

impl RunOrchestrator {
    pub fn new(ctx: OrchestratorContext, config: OrchestratorConfig) -> Self {
        Self {
            segmenter: Segmenter::new(config.segmenter.clone()),
            ctx: Arc::new(ctx),
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.ctx.store
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Queue a new run
    pub async fn submit(&self, request: RunRequest) -> Result<Run, RunError> {
        let run = Run::queued(request, Utc::now());
        self.ctx.store.create_run(&run).await?;
        info!(
            run_id = %run.run_id,
            tenant_id = %run.tenant_id,
            template_id = %run.template_id,
            mode = ?run.mode,
            "run queued"
        );
        Ok(run)
    }

    pub async fn get_run(&self, run_id: &str) -> Result<Run, RunError> {
        self.ctx
            .store
            .get_run(run_id)
            .await?
            .ok_or_else(|| RunError::RunNotFound(run_id.to_string()))
    }

    /// Conditionally move a QUEUED run to RUNNING. `None` when the run was in
    /// any other status, in which case nothing changes.
    pub async fn begin(&self, run_id: &str) -> Result<Option<Run>, RunError> {
        let update = RunUpdate::status(RunStatus::Running).started_at(Utc::now());
        match self.ctx.store.transition(run_id, RunStatus::Queued, update).await {
            Ok(run) => Ok(run),
            Err(StoreError::RunNotFound(id)) => Err(RunError::RunNotFound(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Begin and execute a run, returning it in its final state. A run that
    /// is not QUEUED is returned unchanged.
    pub async fn process(&self, run_id: &str) -> Result<Run, RunError> {
        let Some(run) = self.begin(run_id).await? else {
            debug!(run_id, "run is not queued; begin is a no-op");
            return self.get_run(run_id).await;
        };
        info!(run_id = %run.run_id, tenant_id = %run.tenant_id, "run started");

        match self.execute(&run).await {
            Ok(execution) => {
                info!(
                    run_id = %run.run_id,
                    tenant_id = %run.tenant_id,
                    outcome = %execution.outcome,
                    score = execution.score,
                    segments = execution.segment_count,
                    two_phase = execution.two_phase,
                    "run succeeded"
                );
                let write_mode = if execution.two_phase { "TWO_PHASE" } else { "ATOMIC" };
                let entry = self
                    .audit_entry(&run, AuditAction::RunSucceeded)
                    .with_meta(json!({
                        "resultId": execution.result_id,
                        "overallOutcome": execution.outcome,
                        "overallScore": execution.score,
                        "segmentCount": execution.segment_count,
                        "writeMode": write_mode,
                    }));
                self.record_audit(entry).await;
                self.get_run(run_id).await
            }
            Err(err) => self.fail(run, err).await,
        }
    }

    /// Cancel a QUEUED run. Returns false when the run had already started.
    pub async fn cancel(&self, run_id: &str) -> Result<bool, RunError> {
        let update = RunUpdate::status(RunStatus::Cancelled).completed_at(Utc::now());
        let cancelled = match self.ctx.store.transition(run_id, RunStatus::Queued, update).await {
            Ok(run) => run,
            Err(StoreError::RunNotFound(id)) => return Err(RunError::RunNotFound(id)),
            Err(e) => return Err(e.into()),
        };

        match cancelled {
            Some(run) => {
                info!(run_id, tenant_id = %run.tenant_id, "run cancelled");
                self.record_audit(self.audit_entry(&run, AuditAction::RunCancelled))
                    .await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn execute(&self, run: &Run) -> Result<Execution, RunError> {
        let snapshot = self.resolve_snapshot(run).await?;
        let loaded = load_input(
            run,
            self.ctx.input_loader.as_ref(),
            self.ctx.secrets.as_ref(),
            &self.ctx.connectors,
        )
        .await?;

        let executed_at = Utc::now();
        let evaluated = self.evaluate_input(run, &snapshot, &loaded, executed_at).await?;

        let result_id = result_id_for(&run.run_id);
        let outcome = evaluated.summary.overall_outcome;
        let score = evaluated.summary.overall_score;
        let segment_count = evaluated.segments.len();

        let result = ResultDocument {
            result_id: result_id.clone(),
            run_id: run.run_id.clone(),
            tenant_id: run.tenant_id.clone(),
            summary: evaluated.summary,
            integrity: Integrity {
                template_version_id: run.template_version_id.clone(),
                template_version: run.template_version,
                input_fingerprint: loaded.fingerprint.clone(),
            },
            write_state: WriteState::Writing,
            expected_rule_count: evaluated.records.len(),
            expected_segment_count: segment_count,
            segmentation: evaluated.segmentation,
            created_at: Utc::now(),
            completed_at: None,
        };

        let finish = RunUpdate::status(RunStatus::Succeeded)
            .completed_at(Utc::now())
            .with_result(result_id.clone())
            .with_fingerprint(loaded.fingerprint);

        let ceiling = self.ctx.store.max_batch_writes();
        let plan = WritePlan::build(
            ResultBundle {
                result,
                rules: evaluated.records,
                segments: evaluated.segments,
            },
            &run.run_id,
            finish,
            ceiling,
            self.config.chunk_size_for(ceiling),
        );
        let two_phase = !plan.is_atomic();
        debug!(
            run_id = %run.run_id,
            batches = plan.batch_count(),
            ceiling,
            two_phase,
            "persisting result"
        );
        plan.execute(self.ctx.store.as_ref()).await?;

        Ok(Execution {
            result_id,
            outcome,
            score,
            segment_count,
            two_phase,
        })
    }

    async fn resolve_snapshot(&self, run: &Run) -> Result<RuleSnapshot, RunError> {
        self.ctx
            .snapshots
            .rule_snapshot(&run.tenant_id, &run.template_id, &run.template_version_id)
            .await
            .map_err(RunError::Snapshot)?
            .ok_or_else(|| RunError::TemplateVersionNotFound {
                template_version_id: run.template_version_id.clone(),
            })
    }

    async fn evaluate_input(
        &self,
        run: &Run,
        snapshot: &RuleSnapshot,
        loaded: &LoadedInput,
        executed_at: DateTime<Utc>,
    ) -> Result<Evaluated, RunError> {
        let segmentation = match &loaded.input {
            NormalizedInput::Text { text, .. } if self.config.segmentation_enabled => {
                let result = self.segmenter.segment(text);
                info!(
                    run_id = %run.run_id,
                    strategy = %result.strategy,
                    segments = result.chats.len(),
                    "transcript segmented"
                );
                if let Some(warning) = &result.warning {
                    debug!(run_id = %run.run_id, warning = %warning, "segmentation warning");
                }
                Some(result)
            }
            _ => None,
        };

        let info = segmentation.as_ref().map(|s| SegmentationInfo {
            strategy: s.strategy,
            segment_count: s.chats.len(),
            warning: s.warning.clone(),
        });

        let chats = match segmentation {
            Some(result) if result.is_multi() => result.chats,
            _ => {
                let signals = self.signals_for(run, &loaded.input).await;
                let result = evaluate(
                    &loaded.input,
                    snapshot.rules(),
                    executed_at,
                    signals.as_ref(),
                    &self.config.engine,
                )?;
                let records = map_results(&result);
                return Ok(Evaluated {
                    summary: summarize(&result.summary, &records),
                    records,
                    segments: Vec::new(),
                    segmentation: info,
                });
            }
        };

        let locale = match &loaded.input {
            NormalizedInput::Text { locale, .. } => locale.clone(),
            _ => None,
        };

        let mut evaluations = Vec::with_capacity(chats.len());
        let mut segments = Vec::with_capacity(chats.len());
        for chat in chats {
            let input = NormalizedInput::Text {
                text: chat.text.clone(),
                locale: locale.clone(),
            };
            let signals = self.signals_for(run, &input).await;
            let result = evaluate(
                &input,
                snapshot.rules(),
                executed_at,
                signals.as_ref(),
                &self.config.engine,
            )?;
            let records = map_results(&result);

            segments.push((
                SegmentRecord {
                    segment_id: segment_id_for(chat.index),
                    index: chat.index,
                    title: chat.title.clone(),
                    chat_id: chat.chat_id.clone(),
                    participants: chat.participants.clone(),
                    summary: summarize(&result.summary, &records),
                    rule_count: records.len(),
                },
                records.clone(),
            ));
            evaluations.push(SegmentEvaluation {
                title: chat.title,
                records,
                summary: result.summary,
            });
        }

        let combined = aggregate(&evaluations)?;
        let summary = ResultSummary {
            overall_outcome: combined.overall_outcome,
            overall_score: combined.overall_score,
            failed_rule_ids: combined.failed_rule_ids,
            rule_counts: RuleCounts::from_records(&combined.records),
            engine_version: qc_core::ENGINE_VERSION.to_string(),
            executed_at,
        };

        Ok(Evaluated {
            summary,
            records: combined.records,
            segments,
            segmentation: info,
        })
    }

    /// Signals for a text input; a failing source counts as no signals
    async fn signals_for(&self, run: &Run, input: &NormalizedInput) -> Option<AiSignals> {
        let source = self.ctx.signals.as_ref()?;
        let text = input.as_text()?;
        match source.signals(run, text).await {
            Ok(signals) => signals,
            Err(e) => {
                warn!(run_id = %run.run_id, error = %e, "signal source failed; evaluating without signals");
                None
            }
        }
    }

    async fn fail(&self, run: Run, err: RunError) -> Result<Run, RunError> {
        let public = err.to_public();
        error!(
            run_id = %run.run_id,
            tenant_id = %run.tenant_id,
            code = %public.code,
            error = %err,
            "run failed"
        );

        let update = RunUpdate::status(RunStatus::Failed)
            .completed_at(Utc::now())
            .with_error(public.clone());
        let meta = json!({
            "category": public.category,
            "code": public.code,
            "retryable": public.retryable,
        });

        let mut attempt = 1;
        let transitioned = loop {
            match self
                .ctx
                .store
                .transition(&run.run_id, RunStatus::Running, update.clone())
                .await
            {
                Ok(transitioned) => break Ok(transitioned),
                Err(e) if attempt < FAIL_TRANSITION_ATTEMPTS => {
                    warn!(run_id = %run.run_id, attempt, error = %e, "marking run failed did not persist; retrying");
                    attempt += 1;
                }
                Err(e) => break Err(e),
            }
        };

        match transitioned {
            Ok(Some(failed)) => {
                let entry = self.audit_entry(&failed, AuditAction::RunFailed).with_meta(meta);
                self.record_audit(entry).await;
                Ok(failed)
            }
            Ok(None) => {
                warn!(run_id = %run.run_id, "run left RUNNING before it could be marked failed");
                self.get_run(&run.run_id).await
            }
            Err(e) => {
                // Audited even though the run stays RUNNING
                error!(
                    run_id = %run.run_id,
                    tenant_id = %run.tenant_id,
                    attempts = attempt,
                    error = %e,
                    "run could not be marked failed and remains RUNNING"
                );
                let mut meta = meta;
                meta["statusPersisted"] = json!(false);
                let entry = self.audit_entry(&run, AuditAction::RunFailed).with_meta(meta);
                self.record_audit(entry).await;
                Err(RunError::Store(e))
            }
        }
    }

    fn audit_entry(&self, run: &Run, action: AuditAction) -> AuditEntry {
        AuditEntry::new(&run.tenant_id, action, &run.run_id)
            .with_actor(run.requested_by.as_deref().unwrap_or("system"))
    }

    /// Audit is best-effort and never changes the run's outcome
    async fn record_audit(&self, entry: AuditEntry) {
        let action = entry.action;
        let resource_id = entry.resource_id.clone();
        if let Err(e) = self.ctx.audit.record(entry).await {
            warn!(run_id = %resource_id, action = %action, error = %e, "audit record failed");
        }
    }
}

fn summarize(summary: &RunSummary, records: &[RuleResultRecord]) -> ResultSummary {
    ResultSummary {
        overall_outcome: summary.overall_outcome,
        overall_score: summary.overall_score,
        failed_rule_ids: summary.failed_rule_ids.clone(),
        rule_counts: RuleCounts::from_records(records),
        engine_version: summary.engine_version.clone(),
        executed_at: summary.executed_at,
    }
}
