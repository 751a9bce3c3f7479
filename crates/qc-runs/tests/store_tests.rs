//! Integration tests for the store contract and segment aggregation

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use qc_core::{Evidence, EvidenceKind, InputFingerprint, NormalizedInput, Severity, ENGINE_VERSION};
use qc_engine::{OverallOutcome, RuleType, RunSummary};
use qc_runs::{
    aggregate, result_id_for, rule_record_id, read_complete_result, InputSource, Integrity,
    MemoryRunStore, ResultDocument, ResultSummary, RuleCounts, RuleResultRecord, RuleStatus, Run,
    RunMode, RunRequest, RunStatus, RunStore, RunUpdate, SegmentEvaluation, StoreError,
    WriteBatch, WriteOp, WriteState,
};

fn queued_run(run_id: &str) -> Run {
    let request = RunRequest {
        tenant_id: "acme".into(),
        template_id: "support-qc".into(),
        template_version: 1,
        template_version_id: "support-qc-v1".into(),
        mode: RunMode::Sync,
        input_source: InputSource::Inline {
            input: NormalizedInput::text("hello"),
        },
        input_fingerprint: None,
        requested_by: None,
    };
    Run::queued_with_id(run_id, request, Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap())
}

fn record(order: usize, rule_id: &str, status: RuleStatus) -> RuleResultRecord {
    RuleResultRecord {
        order,
        rule_id: rule_id.into(),
        rule_name: rule_id.into(),
        rule_type: RuleType::TextRequiredPhrase,
        version: 1,
        weight: 1.0,
        severity: Severity::Major,
        status,
        score: if status == RuleStatus::Pass { 1.0 } else { 0.0 },
        reason: None,
        evidence: vec![Evidence::new(EvidenceKind::PhraseFound, "found")],
        error: None,
    }
}

fn document(run_id: &str, write_state: WriteState, expected_rule_count: usize) -> ResultDocument {
    let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 1).unwrap();
    ResultDocument {
        result_id: result_id_for(run_id),
        run_id: run_id.into(),
        tenant_id: "acme".into(),
        summary: ResultSummary {
            overall_outcome: OverallOutcome::Pass,
            overall_score: 1.0,
            failed_rule_ids: Vec::new(),
            rule_counts: RuleCounts::default(),
            engine_version: ENGINE_VERSION.into(),
            executed_at: at,
        },
        integrity: Integrity {
            template_version_id: "support-qc-v1".into(),
            template_version: 1,
            input_fingerprint: InputFingerprint::sha256("ab".repeat(32)),
        },
        write_state,
        expected_rule_count,
        expected_segment_count: 0,
        segmentation: None,
        created_at: at,
        completed_at: None,
    }
}

fn put_rule(run_id: &str, record: RuleResultRecord) -> WriteOp {
    WriteOp::PutRuleResult {
        result_id: result_id_for(run_id),
        record_id: rule_record_id(record.order, &record.rule_id),
        record,
    }
}

async fn running_store(run_id: &str) -> MemoryRunStore {
    let store = MemoryRunStore::new();
    store.create_run(&queued_run(run_id)).await.unwrap();
    store
        .transition(run_id, RunStatus::Queued, RunUpdate::status(RunStatus::Running))
        .await
        .unwrap()
        .unwrap();
    store
}

// =============================================================================
// Batches
// =============================================================================

#[tokio::test]
async fn test_batch_over_ceiling_rejected() {
    let store = MemoryRunStore::with_max_batch_writes(3);
    store.create_run(&queued_run("r1")).await.unwrap();

    let batch: WriteBatch = (0..4)
        .map(|i| put_rule("r1", record(i, &format!("rule-{}", i), RuleStatus::Pass)))
        .collect();
    let err = store.commit(batch).await.unwrap_err();
    assert_eq!(err, StoreError::BatchTooLarge { size: 4, limit: 3 });
}

#[tokio::test]
async fn test_failed_batch_leaves_no_trace() {
    let store = running_store("r1").await;

    // Complete with one of two expected records
    let batch = WriteBatch::new()
        .with(WriteOp::PutResult(document("r1", WriteState::Complete, 2)))
        .with(put_rule("r1", record(0, "a", RuleStatus::Pass)))
        .with(WriteOp::UpdateRun {
            run_id: "r1".into(),
            expected: Some(RunStatus::Running),
            update: RunUpdate::status(RunStatus::Succeeded),
        });
    let err = store.commit(batch).await.unwrap_err();
    assert!(matches!(err, StoreError::IncompleteResult { .. }));

    assert!(store.get_result(&result_id_for("r1")).await.unwrap().is_none());
    assert!(store.list_rule_results(&result_id_for("r1")).await.unwrap().is_empty());
    assert_eq!(
        store.get_run("r1").await.unwrap().unwrap().status,
        RunStatus::Running
    );
}

#[tokio::test]
async fn test_conditional_run_update_conflicts() {
    let store = MemoryRunStore::new();
    store.create_run(&queued_run("r1")).await.unwrap();

    let batch = WriteBatch::new().with(WriteOp::UpdateRun {
        run_id: "r1".into(),
        expected: Some(RunStatus::Running),
        update: RunUpdate::status(RunStatus::Succeeded),
    });
    let err = store.commit(batch).await.unwrap_err();
    assert_eq!(
        err,
        StoreError::Conflict {
            run_id: "r1".into(),
            expected: RunStatus::Running,
            actual: RunStatus::Queued,
        }
    );
}

#[tokio::test]
async fn test_duplicate_run_rejected() {
    let store = MemoryRunStore::new();
    store.create_run(&queued_run("r1")).await.unwrap();
    assert_eq!(
        store.create_run(&queued_run("r1")).await.unwrap_err(),
        StoreError::RunExists("r1".into())
    );
    assert_eq!(store.run_count(), 1);
}

// =============================================================================
// Two-Phase Results
// =============================================================================

#[tokio::test]
async fn test_redriven_chunks_are_upserts() {
    let store = running_store("r1").await;
    let result_id = result_id_for("r1");

    store
        .commit(WriteBatch::new().with(WriteOp::PutResult(document("r1", WriteState::Writing, 2))))
        .await
        .unwrap();
    let chunk: WriteBatch = vec![
        put_rule("r1", record(0, "a", RuleStatus::Pass)),
        put_rule("r1", record(1, "b", RuleStatus::Fail)),
    ]
    .into_iter()
    .collect();
    store.commit(chunk.clone()).await.unwrap();
    // A resumed writer replays the same chunk
    store.commit(chunk).await.unwrap();
    assert_eq!(store.list_rule_results(&result_id).await.unwrap().len(), 2);

    // Readers see nothing until the run succeeds on a complete result
    assert!(read_complete_result(&store, "r1").await.unwrap().is_none());

    let close = WriteBatch::new()
        .with(WriteOp::CompleteResult {
            result_id: result_id.clone(),
            completed_at: Utc::now(),
        })
        .with(WriteOp::UpdateRun {
            run_id: "r1".into(),
            expected: Some(RunStatus::Running),
            update: RunUpdate::status(RunStatus::Succeeded).with_result(result_id.clone()),
        });
    store.commit(close).await.unwrap();

    let complete = read_complete_result(&store, "r1").await.unwrap().unwrap();
    assert_eq!(complete.rules.len(), 2);
    assert_eq!(complete.rules[1].rule_id, "b");
}

#[tokio::test]
async fn test_complete_result_is_sealed() {
    let store = running_store("r1").await;
    let batch = WriteBatch::new()
        .with(WriteOp::PutResult(document("r1", WriteState::Complete, 1)))
        .with(put_rule("r1", record(0, "a", RuleStatus::Pass)));
    store.commit(batch).await.unwrap();

    let rewrite = WriteBatch::new().with(WriteOp::PutResult(document("r1", WriteState::Writing, 1)));
    assert_eq!(
        store.commit(rewrite).await.unwrap_err(),
        StoreError::ResultSealed(result_id_for("r1"))
    );
    let late = WriteBatch::new().with(put_rule("r1", record(0, "a", RuleStatus::Fail)));
    assert!(matches!(
        store.commit(late).await.unwrap_err(),
        StoreError::ResultSealed(_)
    ));
}

#[tokio::test]
async fn test_closing_early_is_rejected() {
    let store = running_store("r1").await;
    let result_id = result_id_for("r1");
    store
        .commit(WriteBatch::new().with(WriteOp::PutResult(document("r1", WriteState::Writing, 3))))
        .await
        .unwrap();
    store
        .commit(WriteBatch::new().with(put_rule("r1", record(0, "a", RuleStatus::Pass))))
        .await
        .unwrap();

    let close = WriteBatch::new().with(WriteOp::CompleteResult {
        result_id: result_id.clone(),
        completed_at: Utc::now(),
    });
    assert!(matches!(
        store.commit(close).await.unwrap_err(),
        StoreError::IncompleteResult { .. }
    ));
    assert_eq!(
        store.get_result(&result_id).await.unwrap().unwrap().write_state,
        WriteState::Writing
    );
}

#[tokio::test]
async fn test_close_counts_replayed_records_once() {
    let store = running_store("r1").await;
    let result_id = result_id_for("r1");
    store
        .commit(WriteBatch::new().with(WriteOp::PutResult(document("r1", WriteState::Writing, 3))))
        .await
        .unwrap();
    store
        .commit(
            WriteBatch::new()
                .with(put_rule("r1", record(0, "a", RuleStatus::Pass)))
                .with(put_rule("r1", record(1, "b", RuleStatus::Pass))),
        )
        .await
        .unwrap();

    // Replays b and adds c in the same batch that closes the result
    let close = WriteBatch::new()
        .with(put_rule("r1", record(1, "b", RuleStatus::Fail)))
        .with(put_rule("r1", record(2, "c", RuleStatus::Pass)))
        .with(WriteOp::CompleteResult {
            result_id: result_id.clone(),
            completed_at: Utc::now(),
        })
        .with(WriteOp::UpdateRun {
            run_id: "r1".into(),
            expected: Some(RunStatus::Running),
            update: RunUpdate::status(RunStatus::Succeeded).with_result(result_id.clone()),
        });
    store.commit(close).await.unwrap();

    let complete = read_complete_result(&store, "r1").await.unwrap().unwrap();
    assert_eq!(complete.rules.len(), 3);
    assert_eq!(complete.rules[1].status, RuleStatus::Fail);
}

#[tokio::test]
async fn test_rejected_batch_keeps_committed_records() {
    let store = running_store("r1").await;
    let result_id = result_id_for("r1");
    store
        .commit(
            WriteBatch::new()
                .with(WriteOp::PutResult(document("r1", WriteState::Writing, 2)))
                .with(put_rule("r1", record(0, "a", RuleStatus::Pass))),
        )
        .await
        .unwrap();

    // Overwrites a committed record, then trips the run guard
    let batch = WriteBatch::new()
        .with(put_rule("r1", record(0, "a", RuleStatus::Fail)))
        .with(put_rule("r1", record(1, "b", RuleStatus::Pass)))
        .with(WriteOp::UpdateRun {
            run_id: "r1".into(),
            expected: Some(RunStatus::Queued),
            update: RunUpdate::status(RunStatus::Succeeded),
        });
    assert!(matches!(
        store.commit(batch).await.unwrap_err(),
        StoreError::Conflict { .. }
    ));

    let rules = store.list_rule_results(&result_id).await.unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].status, RuleStatus::Pass);
    assert_eq!(
        store.get_run("r1").await.unwrap().unwrap().status,
        RunStatus::Running
    );
}

// =============================================================================
// Aggregation Properties
// =============================================================================

fn status_strategy() -> impl Strategy<Value = RuleStatus> {
    prop_oneof![
        Just(RuleStatus::Pass),
        Just(RuleStatus::Fail),
        Just(RuleStatus::NotEvaluated),
        Just(RuleStatus::Error),
    ]
}

fn segment(title: String, statuses: &[RuleStatus], score: f64) -> SegmentEvaluation {
    let records: Vec<RuleResultRecord> = statuses
        .iter()
        .enumerate()
        .map(|(i, status)| record(i, &format!("rule-{}", i), *status))
        .collect();
    let failed_rule_ids = records
        .iter()
        .filter(|r| r.status == RuleStatus::Fail)
        .map(|r| r.rule_id.clone())
        .collect();
    SegmentEvaluation {
        title,
        summary: RunSummary {
            engine_version: ENGINE_VERSION.into(),
            executed_at: Utc::now(),
            overall_outcome: if score < 1.0 {
                OverallOutcome::Fail
            } else {
                OverallOutcome::Pass
            },
            overall_score: score,
            failed_rule_ids,
        },
        records,
    }
}

proptest! {
    #[test]
    fn test_aggregate_is_pessimistic(
        grid in (1usize..6).prop_flat_map(|rules| {
            prop::collection::vec(
                (prop::collection::vec(status_strategy(), rules), 0.0f64..=1.0),
                1..5,
            )
        })
    ) {
        let segments: Vec<SegmentEvaluation> = grid
            .iter()
            .enumerate()
            .map(|(i, (statuses, score))| segment(format!("Chat {}", i + 1), statuses, *score))
            .collect();
        let combined = aggregate(&segments).unwrap();

        let min_score = segments.iter().map(|s| s.summary.overall_score).fold(1.0, f64::min);
        prop_assert_eq!(combined.overall_score, min_score);

        let any_fail = segments.iter().any(|s| s.summary.overall_outcome == OverallOutcome::Fail);
        prop_assert_eq!(combined.overall_outcome == OverallOutcome::Fail, any_fail);

        for (order, merged) in combined.records.iter().enumerate() {
            for s in &segments {
                prop_assert!(merged.status.rank() >= s.records[order].status.rank());
                prop_assert!(merged.score <= s.records[order].score);
            }
            prop_assert!(merged.evidence.len() <= 25);
        }
    }
}
