//! QC Runs - run lifecycle, persistence and orchestration
//!
//! A run moves `QUEUED → RUNNING → SUCCEEDED | FAILED` (or `QUEUED →
//! CANCELLED`). The [`RunOrchestrator`] drives one run at a time through
//! snapshot resolution, input loading, segmentation, evaluation and
//! persistence. Persistence targets a [`RunStore`] whose transactions have a
//! write ceiling; results too large for one transaction are written in two
//! phases so no reader ever sees a SUCCEEDED run with partial results.

pub mod aggregate;
pub mod audit;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod input;
pub mod mapper;
pub mod memory;
pub mod orchestrator;
pub mod persist;
pub mod reader;
pub mod result;
pub mod run;
pub mod store;

pub use aggregate::{aggregate, Aggregate, AggregationError, SegmentEvaluation};
pub use audit::{AuditAction, AuditEntry, MemoryAuditSink, TracingAuditSink};
pub use collaborators::{
    AuditSink, CollaboratorError, Connector, ConnectorRegistry, InputLoader, MemoryInputLoader,
    MemorySecretAccessor, MemorySnapshotSource, SecretAccessor, SignalSource, SnapshotSource,
};
pub use config::{ConfigError, OrchestratorConfig};
pub use error::RunError;
pub use input::{upload_scope, validate_storage_path, LoadedInput};
pub use mapper::{map_results, RuleCounts, RuleResultRecord, RuleStatus};
pub use memory::MemoryRunStore;
pub use orchestrator::{OrchestratorContext, RunOrchestrator};
pub use persist::{ResultBundle, WritePlan};
pub use reader::{read_complete_result, CompleteResult, SegmentResult};
pub use result::{
    result_id_for, rule_record_id, segment_id_for, Integrity, ResultDocument, ResultSummary, SegmentRecord,
    SegmentationInfo, WriteState,
};
pub use run::{InputSource, Run, RunMode, RunRequest, RunStatus, RunUpdate};
pub use store::{RunStore, StoreError, WriteBatch, WriteOp, DEFAULT_MAX_BATCH_WRITES};
