//! Worst-case combination of per-segment results
//!
//! Every segment is evaluated against the same snapshot, so record `i` of
//! each segment describes the same rule. The combined record takes the worst
//! status and the lowest score; the run is FAIL as soon as any segment is.

use crate::mapper::{RuleResultRecord, RuleStatus};
use qc_core::Evidence;
use qc_engine::{OverallOutcome, RunSummary};
use thiserror::Error;

/// Combined evidence is capped at this many entries per rule
pub const MAX_AGGREGATED_EVIDENCE: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    #[error("segment {segment} has {actual} rule results, expected {expected}")]
    RuleCountMismatch {
        segment: usize,
        expected: usize,
        actual: usize,
    },
    #[error("segment {segment} has rule {actual} at position {order}, expected {expected}")]
    RuleOrderMismatch {
        segment: usize,
        order: usize,
        expected: String,
        actual: String,
    },
}

/// Mapped output of evaluating one segment
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentEvaluation {
    pub title: String,
    pub records: Vec<RuleResultRecord>,
    pub summary: RunSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub records: Vec<RuleResultRecord>,
    pub overall_outcome: OverallOutcome,
    pub overall_score: f64,
    pub failed_rule_ids: Vec<String>,
}

pub fn aggregate(segments: &[SegmentEvaluation]) -> Result<Aggregate, AggregationError> {
    let Some(first) = segments.first() else {
        return Ok(Aggregate {
            records: Vec::new(),
            overall_outcome: OverallOutcome::Pass,
            overall_score: 1.0,
            failed_rule_ids: Vec::new(),
        });
    };

    let expected = first.records.len();
    for (index, segment) in segments.iter().enumerate() {
        if segment.records.len() != expected {
            return Err(AggregationError::RuleCountMismatch {
                segment: index,
                expected,
                actual: segment.records.len(),
            });
        }
        for (order, (record, reference)) in segment.records.iter().zip(&first.records).enumerate() {
            if record.rule_id != reference.rule_id {
                return Err(AggregationError::RuleOrderMismatch {
                    segment: index,
                    order,
                    expected: reference.rule_id.clone(),
                    actual: record.rule_id.clone(),
                });
            }
        }
    }

    let records = (0..expected)
        .map(|order| combine_rule(segments, order))
        .collect();

    let overall_outcome = if segments
        .iter()
        .any(|s| s.summary.overall_outcome == OverallOutcome::Fail)
    {
        OverallOutcome::Fail
    } else {
        OverallOutcome::Pass
    };

    let overall_score = segments
        .iter()
        .map(|s| s.summary.overall_score)
        .fold(1.0_f64, f64::min);

    let mut failed_rule_ids: Vec<String> = Vec::new();
    for id in segments.iter().flat_map(|s| &s.summary.failed_rule_ids) {
        if !failed_rule_ids.contains(id) {
            failed_rule_ids.push(id.clone());
        }
    }

    Ok(Aggregate {
        records,
        overall_outcome,
        overall_score,
        failed_rule_ids,
    })
}

fn combine_rule(segments: &[SegmentEvaluation], order: usize) -> RuleResultRecord {
    let column: Vec<(&str, &RuleResultRecord)> = segments
        .iter()
        .map(|s| (s.title.as_str(), &s.records[order]))
        .collect();

    let status = column
        .iter()
        .map(|(_, r)| r.status)
        .max_by_key(RuleStatus::rank)
        .unwrap_or(RuleStatus::NotEvaluated);
    let score = column.iter().map(|(_, r)| r.score).fold(1.0_f64, f64::min);

    let matching: Vec<&(&str, &RuleResultRecord)> =
        column.iter().filter(|(_, r)| r.status == status).collect();

    let evidence: Vec<Evidence> = matching
        .iter()
        .flat_map(|(title, r)| {
            r.evidence.iter().map(move |e| Evidence {
                message: format!("[{}] {}", title, e.message),
                ..e.clone()
            })
        })
        .take(MAX_AGGREGATED_EVIDENCE)
        .collect();

    let reason = matching.iter().find_map(|(_, r)| r.reason.clone());
    let error = matching.iter().find_map(|(_, r)| r.error.clone());

    let (_, base) = column[0];
    RuleResultRecord {
        status,
        score,
        reason,
        evidence,
        error,
        ..base.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use qc_core::{EvidenceKind, Severity};
    use qc_engine::RuleType;

    fn record(rule_id: &str, status: RuleStatus, score: f64, message: &str) -> RuleResultRecord {
        RuleResultRecord {
            order: 0,
            rule_id: rule_id.into(),
            rule_name: rule_id.into(),
            rule_type: RuleType::TextRequiredPhrase,
            version: 1,
            weight: 1.0,
            severity: Severity::Major,
            status,
            score,
            reason: Some(message.into()),
            evidence: vec![Evidence::new(EvidenceKind::PhraseMissing, message)],
            error: None,
        }
    }

    fn segment(title: &str, records: Vec<RuleResultRecord>, outcome: OverallOutcome, score: f64) -> SegmentEvaluation {
        let failed_rule_ids = records
            .iter()
            .filter(|r| r.status == RuleStatus::Fail)
            .map(|r| r.rule_id.clone())
            .collect();
        SegmentEvaluation {
            title: title.into(),
            records,
            summary: RunSummary {
                engine_version: "test".into(),
                executed_at: Utc::now(),
                overall_outcome: outcome,
                overall_score: score,
                failed_rule_ids,
            },
        }
    }

    #[test]
    fn test_worst_status_and_prefixed_evidence() {
        let segments = vec![
            segment(
                "Chat 1",
                vec![record("greeting", RuleStatus::Pass, 1.0, "found")],
                OverallOutcome::Pass,
                1.0,
            ),
            segment(
                "Chat 2",
                vec![record("greeting", RuleStatus::Fail, 0.0, "missing")],
                OverallOutcome::Fail,
                0.0,
            ),
        ];

        let combined = aggregate(&segments).unwrap();
        let rule = &combined.records[0];
        assert_eq!(rule.status, RuleStatus::Fail);
        assert_eq!(rule.score, 0.0);
        assert_eq!(rule.reason.as_deref(), Some("missing"));
        assert_eq!(rule.evidence.len(), 1);
        assert_eq!(rule.evidence[0].message, "[Chat 2] missing");
        assert_eq!(combined.overall_outcome, OverallOutcome::Fail);
        assert_eq!(combined.overall_score, 0.0);
        assert_eq!(combined.failed_rule_ids, vec!["greeting".to_string()]);
    }

    #[test]
    fn test_evidence_cap() {
        let mut noisy = record("kw", RuleStatus::Fail, 0.0, "hit");
        noisy.evidence = (0..20)
            .map(|i| Evidence::new(EvidenceKind::KeywordHit, format!("hit {}", i)))
            .collect();
        let segments = vec![
            segment("A", vec![noisy.clone()], OverallOutcome::Fail, 0.0),
            segment("B", vec![noisy], OverallOutcome::Fail, 0.0),
        ];
        let combined = aggregate(&segments).unwrap();
        assert_eq!(combined.records[0].evidence.len(), MAX_AGGREGATED_EVIDENCE);
        assert_eq!(combined.failed_rule_ids.len(), 1);
    }

    #[test]
    fn test_mismatched_segments_rejected() {
        let segments = vec![
            segment("A", vec![record("a", RuleStatus::Pass, 1.0, "ok")], OverallOutcome::Pass, 1.0),
            segment("B", vec![record("b", RuleStatus::Pass, 1.0, "ok")], OverallOutcome::Pass, 1.0),
        ];
        assert!(matches!(
            aggregate(&segments),
            Err(AggregationError::RuleOrderMismatch { .. })
        ));

        let short = vec![
            segment("A", vec![record("a", RuleStatus::Pass, 1.0, "ok")], OverallOutcome::Pass, 1.0),
            segment("B", vec![], OverallOutcome::Pass, 1.0),
        ];
        assert!(matches!(
            aggregate(&short),
            Err(AggregationError::RuleCountMismatch { .. })
        ));
    }

    #[test]
    fn test_no_segments() {
        let combined = aggregate(&[]).unwrap();
        assert_eq!(combined.overall_score, 1.0);
        assert_eq!(combined.overall_outcome, OverallOutcome::Pass);
    }
}
