//! Reading finished results

use crate::mapper::RuleResultRecord;
use crate::result::{result_id_for, ResultDocument, SegmentRecord};
use crate::run::{Run, RunStatus};
use crate::store::{RunStore, StoreError};
use serde::Serialize;

/// A fully written result with all dependent records
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteResult {
    pub run: Run,
    pub result: ResultDocument,
    pub rules: Vec<RuleResultRecord>,
    pub segments: Vec<SegmentResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentResult {
    pub segment: SegmentRecord,
    pub rules: Vec<RuleResultRecord>,
}

/// The run's result, or `None` unless the run is SUCCEEDED, the result is
/// COMPLETE and every expected record is present.
pub async fn read_complete_result(
    store: &dyn RunStore,
    run_id: &str,
) -> Result<Option<CompleteResult>, StoreError> {
    let Some(run) = store.get_run(run_id).await? else {
        return Ok(None);
    };
    if run.status != RunStatus::Succeeded {
        return Ok(None);
    }

    let result_id = run
        .result_id
        .clone()
        .unwrap_or_else(|| result_id_for(&run.run_id));
    let Some(result) = store.get_result(&result_id).await? else {
        return Ok(None);
    };
    if !result.is_complete() {
        return Ok(None);
    }

    let rules = store.list_rule_results(&result_id).await?;
    if rules.len() != result.expected_rule_count {
        return Ok(None);
    }

    let segment_records = store.list_segments(&result_id).await?;
    if segment_records.len() != result.expected_segment_count {
        return Ok(None);
    }

    let mut segments = Vec::with_capacity(segment_records.len());
    for segment in segment_records {
        let rules = store
            .list_segment_rule_results(&result_id, &segment.segment_id)
            .await?;
        if rules.len() != segment.rule_count {
            return Ok(None);
        }
        segments.push(SegmentResult { segment, rules });
    }

    Ok(Some(CompleteResult {
        run,
        result,
        rules,
        segments,
    }))
}
