//! Persistence seam for runs and results
//!
//! A store applies [`WriteBatch`]es atomically and refuses batches larger
//! than its write ceiling. Writes are upserts keyed by deterministic ids; a
//! result that is already COMPLETE is sealed and can no longer change.

use crate::mapper::RuleResultRecord;
use crate::result::{ResultDocument, SegmentRecord};
use crate::run::{Run, RunStatus, RunUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Transaction write ceiling of the reference store
pub const DEFAULT_MAX_BATCH_WRITES: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("batch of {size} writes exceeds the {limit} write ceiling")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("run {0} already exists")]
    RunExists(String),

    #[error("run {0} not found")]
    RunNotFound(String),

    #[error("result {0} not found")]
    ResultNotFound(String),

    #[error("result {0} is complete and cannot be modified")]
    ResultSealed(String),

    #[error("result {result_id} is incomplete: {detail}")]
    IncompleteResult { result_id: String, detail: String },

    #[error("run {run_id} is {actual}, expected {expected}")]
    Conflict {
        run_id: String,
        expected: RunStatus,
        actual: RunStatus,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// One write inside a batch
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Upsert the result header
    PutResult(ResultDocument),
    PutRuleResult {
        result_id: String,
        record_id: String,
        record: RuleResultRecord,
    },
    PutSegment {
        result_id: String,
        segment: SegmentRecord,
    },
    PutSegmentRuleResult {
        result_id: String,
        segment_id: String,
        record_id: String,
        record: RuleResultRecord,
    },
    /// Flip WRITING to COMPLETE; the store verifies every expected record
    CompleteResult {
        result_id: String,
        completed_at: DateTime<Utc>,
    },
    /// Update a run, optionally only when it is in `expected` status
    UpdateRun {
        run_id: String,
        expected: Option<RunStatus>,
        update: RunUpdate,
    },
}

/// Ordered writes committed in one transaction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    pub fn with(mut self, op: WriteOp) -> Self {
        self.ops.push(op);
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

impl FromIterator<WriteOp> for WriteBatch {
    fn from_iter<I: IntoIterator<Item = WriteOp>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
pub trait RunStore: Send + Sync {
    /// Largest batch [`RunStore::commit`] accepts
    fn max_batch_writes(&self) -> usize;

    async fn create_run(&self, run: &Run) -> Result<(), StoreError>;

    async fn get_run(&self, run_id: &str) -> Result<Option<Run>, StoreError>;

    /// Apply `update` only if the run is currently `expected`. Returns the
    /// updated run, or `None` when the run was in another status.
    async fn transition(
        &self,
        run_id: &str,
        expected: RunStatus,
        update: RunUpdate,
    ) -> Result<Option<Run>, StoreError>;

    /// Apply every op or none of them
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    async fn get_result(&self, result_id: &str) -> Result<Option<ResultDocument>, StoreError>;

    /// Rule records ordered by `order`
    async fn list_rule_results(&self, result_id: &str) -> Result<Vec<RuleResultRecord>, StoreError>;

    /// Segment records ordered by `index`
    async fn list_segments(&self, result_id: &str) -> Result<Vec<SegmentRecord>, StoreError>;

    async fn list_segment_rule_results(
        &self,
        result_id: &str,
        segment_id: &str,
    ) -> Result<Vec<RuleResultRecord>, StoreError>;
}
