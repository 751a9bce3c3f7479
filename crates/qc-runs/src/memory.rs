//! In-memory [`RunStore`]
//!
//! A batch is staged in an overlay that holds only the keys it touches,
//! read through to the committed state. The overlay is merged only when
//! every op succeeds, which gives the same all-or-nothing behaviour as a
//! database transaction.

use crate::mapper::RuleResultRecord;
use crate::result::{ResultDocument, SegmentRecord, WriteState};
use crate::run::{Run, RunStatus, RunUpdate};
use crate::store::{RunStore, StoreError, WriteBatch, WriteOp, DEFAULT_MAX_BATCH_WRITES};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

type SegmentKey = (String, String);

#[derive(Debug, Default)]
struct StoreState {
    runs: HashMap<String, Run>,
    results: HashMap<String, ResultDocument>,
    /// result id → record id → record
    rule_results: HashMap<String, BTreeMap<String, RuleResultRecord>>,
    /// result id → segment id → segment
    segments: HashMap<String, BTreeMap<String, SegmentRecord>>,
    /// (result id, segment id) → record id → record
    segment_rules: HashMap<SegmentKey, BTreeMap<String, RuleResultRecord>>,
}

impl StoreState {
    /// COMPLETE results are sealed against every further write
    fn is_sealed(&self, result_id: &str) -> bool {
        self.results.get(result_id).is_some_and(ResultDocument::is_complete)
    }
}

/// Writes of one batch, keyed like [`StoreState`] but holding only what the
/// batch touched
#[derive(Debug, Default)]
struct Overlay {
    runs: HashMap<String, Run>,
    results: HashMap<String, ResultDocument>,
    rule_results: HashMap<String, BTreeMap<String, RuleResultRecord>>,
    segments: HashMap<String, BTreeMap<String, SegmentRecord>>,
    segment_rules: HashMap<SegmentKey, BTreeMap<String, RuleResultRecord>>,
}

/// Entries in `base` plus staged entries under new keys
fn merged_len<V>(base: Option<&BTreeMap<String, V>>, staged: Option<&BTreeMap<String, V>>) -> usize {
    let base_len = base.map_or(0, BTreeMap::len);
    let added = staged.map_or(0, |staged| {
        staged
            .keys()
            .filter(|k| !base.is_some_and(|b| b.contains_key(*k)))
            .count()
    });
    base_len + added
}

impl Overlay {
    fn result<'a>(&'a self, base: &'a StoreState, result_id: &str) -> Option<&'a ResultDocument> {
        self.results
            .get(result_id)
            .or_else(|| base.results.get(result_id))
    }

    fn require_writable(&self, base: &StoreState, result_id: &str) -> Result<(), StoreError> {
        if base.is_sealed(result_id) {
            return Err(StoreError::ResultSealed(result_id.to_string()));
        }
        if self.result(base, result_id).is_none() {
            return Err(StoreError::ResultNotFound(result_id.to_string()));
        }
        Ok(())
    }

    fn apply(&mut self, base: &StoreState, op: WriteOp) -> Result<(), StoreError> {
        match op {
            WriteOp::PutResult(result) => {
                if base.is_sealed(&result.result_id) {
                    return Err(StoreError::ResultSealed(result.result_id));
                }
                self.results.insert(result.result_id.clone(), result);
            }
            WriteOp::PutRuleResult {
                result_id,
                record_id,
                record,
            } => {
                self.require_writable(base, &result_id)?;
                self.rule_results
                    .entry(result_id)
                    .or_default()
                    .insert(record_id, record);
            }
            WriteOp::PutSegment { result_id, segment } => {
                self.require_writable(base, &result_id)?;
                self.segments
                    .entry(result_id)
                    .or_default()
                    .insert(segment.segment_id.clone(), segment);
            }
            WriteOp::PutSegmentRuleResult {
                result_id,
                segment_id,
                record_id,
                record,
            } => {
                self.require_writable(base, &result_id)?;
                self.segment_rules
                    .entry((result_id, segment_id))
                    .or_default()
                    .insert(record_id, record);
            }
            WriteOp::CompleteResult {
                result_id,
                completed_at,
            } => {
                self.require_writable(base, &result_id)?;
                if !self.results.contains_key(&result_id) {
                    if let Some(committed) = base.results.get(&result_id) {
                        self.results.insert(result_id.clone(), committed.clone());
                    }
                }
                if let Some(result) = self.results.get_mut(&result_id) {
                    result.write_state = WriteState::Complete;
                    result.completed_at = Some(completed_at);
                }
            }
            WriteOp::UpdateRun {
                run_id,
                expected,
                update,
            } => {
                if !self.runs.contains_key(&run_id) {
                    let committed = base
                        .runs
                        .get(&run_id)
                        .ok_or_else(|| StoreError::RunNotFound(run_id.clone()))?;
                    self.runs.insert(run_id.clone(), committed.clone());
                }
                let Some(run) = self.runs.get_mut(&run_id) else {
                    return Err(StoreError::RunNotFound(run_id));
                };
                if let Some(expected) = expected {
                    if run.status != expected {
                        return Err(StoreError::Conflict {
                            run_id,
                            expected,
                            actual: run.status,
                        });
                    }
                }
                update.apply(run);
            }
        }
        Ok(())
    }

    /// Staged results that this batch turned COMPLETE
    fn newly_complete(&self, base: &StoreState) -> Vec<String> {
        self.results
            .values()
            .filter(|r| r.is_complete() && !base.is_sealed(&r.result_id))
            .map(|r| r.result_id.clone())
            .collect()
    }

    /// A result marked COMPLETE must hold all of its expected records
    fn verify_complete(&self, base: &StoreState, result_id: &str) -> Result<(), StoreError> {
        let Some(result) = self.result(base, result_id) else {
            return Err(StoreError::ResultNotFound(result_id.to_string()));
        };
        let incomplete = |detail: String| StoreError::IncompleteResult {
            result_id: result_id.to_string(),
            detail,
        };

        let rules = merged_len(
            base.rule_results.get(result_id),
            self.rule_results.get(result_id),
        );
        if rules != result.expected_rule_count {
            return Err(incomplete(format!(
                "{} of {} rule records written",
                rules, result.expected_rule_count
            )));
        }

        let base_segments = base.segments.get(result_id);
        let staged_segments = self.segments.get(result_id);
        let segment_count = merged_len(base_segments, staged_segments);
        if segment_count != result.expected_segment_count {
            return Err(incomplete(format!(
                "{} of {} segments written",
                segment_count, result.expected_segment_count
            )));
        }

        // Staged segments shadow committed ones with the same id
        let mut segments: BTreeMap<&str, &SegmentRecord> = BTreeMap::new();
        for segment in base_segments
            .into_iter()
            .chain(staged_segments)
            .flat_map(BTreeMap::values)
        {
            segments.insert(segment.segment_id.as_str(), segment);
        }
        for segment in segments.values() {
            let key = (result_id.to_string(), segment.segment_id.clone());
            let written = merged_len(base.segment_rules.get(&key), self.segment_rules.get(&key));
            if written != segment.rule_count {
                return Err(incomplete(format!(
                    "segment {} has {} of {} rule records",
                    segment.segment_id, written, segment.rule_count
                )));
            }
        }
        Ok(())
    }

    fn merge_into(self, state: &mut StoreState) {
        state.runs.extend(self.runs);
        state.results.extend(self.results);
        for (result_id, records) in self.rule_results {
            state.rule_results.entry(result_id).or_default().extend(records);
        }
        for (result_id, segments) in self.segments {
            state.segments.entry(result_id).or_default().extend(segments);
        }
        for (key, records) in self.segment_rules {
            state.segment_rules.entry(key).or_default().extend(records);
        }
    }
}

/// Reference store used by tests and the single-process API
#[derive(Debug)]
pub struct MemoryRunStore {
    max_batch_writes: usize,
    state: RwLock<StoreState>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::with_max_batch_writes(DEFAULT_MAX_BATCH_WRITES)
    }

    /// A ceiling below 2 cannot hold the final completion batch and is raised to 2
    pub fn with_max_batch_writes(max_batch_writes: usize) -> Self {
        Self {
            max_batch_writes: max_batch_writes.max(2),
            state: RwLock::new(StoreState::default()),
        }
    }

    pub fn run_count(&self) -> usize {
        self.state.read().runs.len()
    }
}

impl Default for MemoryRunStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sorted_by_order(records: Option<&BTreeMap<String, RuleResultRecord>>) -> Vec<RuleResultRecord> {
    let mut out: Vec<RuleResultRecord> = records
        .map(|r| r.values().cloned().collect())
        .unwrap_or_default();
    out.sort_by_key(|r| r.order);
    out
}

#[async_trait]
impl RunStore for MemoryRunStore {
    fn max_batch_writes(&self) -> usize {
        self.max_batch_writes
    }

    async fn create_run(&self, run: &Run) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if state.runs.contains_key(&run.run_id) {
            return Err(StoreError::RunExists(run.run_id.clone()));
        }
        state.runs.insert(run.run_id.clone(), run.clone());
        Ok(())
    }

    async fn get_run(&self, run_id: &str) -> Result<Option<Run>, StoreError> {
        Ok(self.state.read().runs.get(run_id).cloned())
    }

    async fn transition(
        &self,
        run_id: &str,
        expected: RunStatus,
        update: RunUpdate,
    ) -> Result<Option<Run>, StoreError> {
        let mut state = self.state.write();
        let run = state
            .runs
            .get_mut(run_id)
            .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))?;
        if run.status != expected {
            return Ok(None);
        }
        update.apply(run);
        Ok(Some(run.clone()))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.len() > self.max_batch_writes {
            return Err(StoreError::BatchTooLarge {
                size: batch.len(),
                limit: self.max_batch_writes,
            });
        }

        let mut state = self.state.write();
        let mut overlay = Overlay::default();
        for op in batch.into_ops() {
            overlay.apply(&state, op)?;
        }
        for result_id in overlay.newly_complete(&state) {
            overlay.verify_complete(&state, &result_id)?;
        }

        overlay.merge_into(&mut state);
        Ok(())
    }

    async fn get_result(&self, result_id: &str) -> Result<Option<ResultDocument>, StoreError> {
        Ok(self.state.read().results.get(result_id).cloned())
    }

    async fn list_rule_results(&self, result_id: &str) -> Result<Vec<RuleResultRecord>, StoreError> {
        Ok(sorted_by_order(self.state.read().rule_results.get(result_id)))
    }

    async fn list_segments(&self, result_id: &str) -> Result<Vec<SegmentRecord>, StoreError> {
        let state = self.state.read();
        let mut segments: Vec<SegmentRecord> = state
            .segments
            .get(result_id)
            .map(|s| s.values().cloned().collect())
            .unwrap_or_default();
        segments.sort_by_key(|s| s.index);
        Ok(segments)
    }

    async fn list_segment_rule_results(
        &self,
        result_id: &str,
        segment_id: &str,
    ) -> Result<Vec<RuleResultRecord>, StoreError> {
        let key = (result_id.to_string(), segment_id.to_string());
        Ok(sorted_by_order(self.state.read().segment_rules.get(&key)))
    }
}
