//! Result write planning
//!
//! Small single-chat results go out in one atomic batch that also marks the
//! run SUCCEEDED. Anything else uses two phases: the result header is opened
//! as WRITING, dependent records follow in chunks under the store ceiling,
//! and a final batch flips the result to COMPLETE together with the run.

use crate::mapper::RuleResultRecord;
use crate::result::{rule_record_id, ResultDocument, SegmentRecord, WriteState};
use crate::run::{RunStatus, RunUpdate};
use crate::store::{RunStore, StoreError, WriteBatch, WriteOp};
use chrono::Utc;
use tracing::debug;

/// Everything a finished run persists
#[derive(Debug, Clone, PartialEq)]
pub struct ResultBundle {
    pub result: ResultDocument,
    pub rules: Vec<RuleResultRecord>,
    pub segments: Vec<(SegmentRecord, Vec<RuleResultRecord>)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WritePlan {
    Atomic(WriteBatch),
    TwoPhase {
        open: WriteBatch,
        chunks: Vec<WriteBatch>,
        close: WriteBatch,
    },
}

impl WritePlan {
    /// Plan the writes that persist `bundle` and apply `finish` to `run_id`,
    /// which must still be RUNNING when the last batch commits.
    pub fn build(
        bundle: ResultBundle,
        run_id: &str,
        finish: RunUpdate,
        ceiling: usize,
        chunk_size: usize,
    ) -> Self {
        let ResultBundle {
            mut result,
            rules,
            segments,
        } = bundle;
        let result_id = result.result_id.clone();
        let completed_at = finish.completed_at.unwrap_or_else(Utc::now);

        let finish_run = WriteOp::UpdateRun {
            run_id: run_id.to_string(),
            expected: Some(RunStatus::Running),
            update: finish,
        };

        if segments.is_empty() && rules.len() + 2 <= ceiling {
            result.write_state = WriteState::Complete;
            result.completed_at = Some(completed_at);

            let mut batch = WriteBatch::new().with(WriteOp::PutResult(result));
            for record in rules {
                batch.push(rule_op(&result_id, record));
            }
            batch.push(finish_run);
            return WritePlan::Atomic(batch);
        }

        result.write_state = WriteState::Writing;
        result.completed_at = None;

        let mut dependents: Vec<WriteOp> = rules
            .into_iter()
            .map(|record| rule_op(&result_id, record))
            .collect();
        for (segment, records) in segments {
            let segment_id = segment.segment_id.clone();
            dependents.push(WriteOp::PutSegment {
                result_id: result_id.clone(),
                segment,
            });
            dependents.extend(records.into_iter().map(|record| WriteOp::PutSegmentRuleResult {
                result_id: result_id.clone(),
                segment_id: segment_id.clone(),
                record_id: rule_record_id(record.order, &record.rule_id),
                record,
            }));
        }

        let chunk_size = chunk_size.clamp(1, ceiling.max(1));
        let mut chunks = Vec::new();
        let mut current = WriteBatch::new();
        for op in dependents {
            current.push(op);
            if current.len() == chunk_size {
                chunks.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            chunks.push(current);
        }

        WritePlan::TwoPhase {
            open: WriteBatch::new().with(WriteOp::PutResult(result)),
            chunks,
            close: WriteBatch::new()
                .with(WriteOp::CompleteResult {
                    result_id,
                    completed_at,
                })
                .with(finish_run),
        }
    }

    pub fn is_atomic(&self) -> bool {
        matches!(self, WritePlan::Atomic(_))
    }

    /// Number of store transactions the plan needs
    pub fn batch_count(&self) -> usize {
        match self {
            WritePlan::Atomic(_) => 1,
            WritePlan::TwoPhase { chunks, .. } => chunks.len() + 2,
        }
    }

    pub async fn execute(self, store: &dyn RunStore) -> Result<(), StoreError> {
        match self {
            WritePlan::Atomic(batch) => store.commit(batch).await,
            WritePlan::TwoPhase {
                open,
                chunks,
                close,
            } => {
                store.commit(open).await?;
                let total = chunks.len();
                for (i, chunk) in chunks.into_iter().enumerate() {
                    debug!(chunk = i + 1, total, writes = chunk.len(), "writing result chunk");
                    store.commit(chunk).await?;
                }
                store.commit(close).await
            }
        }
    }
}

fn rule_op(result_id: &str, record: RuleResultRecord) -> WriteOp {
    WriteOp::PutRuleResult {
        result_id: result_id.to_string(),
        record_id: rule_record_id(record.order, &record.rule_id),
        record,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::{RuleCounts, RuleStatus};
    use crate::result::{result_id_for, segment_id_for, Integrity, ResultSummary};
    use qc_core::{InputFingerprint, Severity, ENGINE_VERSION};
    use qc_engine::{OverallOutcome, RuleType};

    fn summary() -> ResultSummary {
        ResultSummary {
            overall_outcome: OverallOutcome::Pass,
            overall_score: 1.0,
            failed_rule_ids: Vec::new(),
            rule_counts: RuleCounts::default(),
            engine_version: ENGINE_VERSION.into(),
            executed_at: Utc::now(),
        }
    }

    fn bundle(rules: usize, segments: usize) -> ResultBundle {
        let records: Vec<RuleResultRecord> = (0..rules)
            .map(|order| RuleResultRecord {
                order,
                rule_id: format!("rule-{}", order),
                rule_name: "rule".into(),
                rule_type: RuleType::TextRequiredPhrase,
                version: 1,
                weight: 1.0,
                severity: Severity::Minor,
                status: RuleStatus::Pass,
                score: 1.0,
                reason: None,
                evidence: Vec::new(),
                error: None,
            })
            .collect();
        let segments = (0..segments)
            .map(|index| {
                let segment = SegmentRecord {
                    segment_id: segment_id_for(index),
                    index,
                    title: format!("Chat {}", index + 1),
                    chat_id: None,
                    participants: None,
                    summary: summary(),
                    rule_count: rules,
                };
                (segment, records.clone())
            })
            .collect();
        ResultBundle {
            result: ResultDocument {
                result_id: result_id_for("r1"),
                run_id: "r1".into(),
                tenant_id: "acme".into(),
                summary: summary(),
                integrity: Integrity {
                    template_version_id: "v1".into(),
                    template_version: 1,
                    input_fingerprint: InputFingerprint::sha256("00"),
                },
                write_state: WriteState::Writing,
                expected_rule_count: rules,
                expected_segment_count: 0,
                segmentation: None,
                created_at: Utc::now(),
                completed_at: None,
            },
            rules: records,
            segments,
        }
    }

    fn finish() -> RunUpdate {
        RunUpdate::status(RunStatus::Succeeded).completed_at(Utc::now())
    }

    #[test]
    fn test_small_result_is_atomic() {
        let plan = WritePlan::build(bundle(3, 0), "r1", finish(), 500, 500);
        let WritePlan::Atomic(batch) = plan else {
            panic!("expected an atomic plan");
        };
        assert_eq!(batch.len(), 5);
        match &batch.ops()[0] {
            WriteOp::PutResult(result) => assert_eq!(result.write_state, WriteState::Complete),
            other => panic!("unexpected first op {:?}", other),
        }
        assert!(matches!(
            batch.ops().last(),
            Some(WriteOp::UpdateRun {
                expected: Some(RunStatus::Running),
                ..
            })
        ));
    }

    #[test]
    fn test_ceiling_forces_two_phase() {
        // 1 + 499 + 1 exceeds 500
        let plan = WritePlan::build(bundle(499, 0), "r1", finish(), 500, 500);
        assert!(!plan.is_atomic());
        assert_eq!(plan.batch_count(), 3);

        let plan = WritePlan::build(bundle(498, 0), "r1", finish(), 500, 500);
        assert!(plan.is_atomic());
    }

    #[test]
    fn test_chunks_respect_chunk_size() {
        let plan = WritePlan::build(bundle(10, 2), "r1", finish(), 500, 4);
        let WritePlan::TwoPhase { open, chunks, close } = plan else {
            panic!("segments always use two phases");
        };
        match &open.ops()[0] {
            WriteOp::PutResult(result) => assert_eq!(result.write_state, WriteState::Writing),
            other => panic!("unexpected open op {:?}", other),
        }
        // 10 rules + 2 segments + 2 * 10 segment rules
        let writes: usize = chunks.iter().map(WriteBatch::len).sum();
        assert_eq!(writes, 32);
        assert!(chunks.iter().all(|c| c.len() <= 4));
        assert_eq!(close.len(), 2);
        assert!(matches!(close.ops()[0], WriteOp::CompleteResult { .. }));
    }
}
