//! Engine results to persisted rule records

use qc_core::{Evidence, PublicError, Severity};
use qc_engine::{RuleOutcome, RuleResult, RuleType, RunResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Persisted per-rule status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleStatus {
    NotEvaluated,
    Pass,
    Fail,
    Error,
}

impl RuleStatus {
    /// Severity rank used when combining segments; higher is worse
    pub fn rank(&self) -> u8 {
        match self {
            RuleStatus::NotEvaluated => 0,
            RuleStatus::Pass => 1,
            RuleStatus::Fail => 2,
            RuleStatus::Error => 3,
        }
    }
}

impl From<RuleOutcome> for RuleStatus {
    fn from(outcome: RuleOutcome) -> Self {
        match outcome {
            RuleOutcome::Pass => RuleStatus::Pass,
            RuleOutcome::Fail => RuleStatus::Fail,
            RuleOutcome::Skip => RuleStatus::NotEvaluated,
            RuleOutcome::Error => RuleStatus::Error,
        }
    }
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RuleStatus::NotEvaluated => write!(f, "NOT_EVALUATED"),
            RuleStatus::Pass => write!(f, "PASS"),
            RuleStatus::Fail => write!(f, "FAIL"),
            RuleStatus::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResultRecord {
    /// Position of the rule in the snapshot
    pub order: usize,
    pub rule_id: String,
    pub rule_name: String,
    pub rule_type: RuleType,
    pub version: u32,
    pub weight: f64,
    pub severity: Severity,
    pub status: RuleStatus,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub evidence: Vec<Evidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PublicError>,
}

impl RuleResultRecord {
    pub fn from_result(order: usize, result: &RuleResult) -> Self {
        let reason = match &result.error {
            Some(error) if result.outcome == RuleOutcome::Error => Some(error.message.clone()),
            _ => result.evidence.first().map(|e| e.message.clone()),
        };

        Self {
            order,
            rule_id: result.rule_id.clone(),
            rule_name: result.rule_name.clone(),
            rule_type: result.rule_type,
            version: result.version,
            weight: result.weight,
            severity: result.severity,
            status: RuleStatus::from(result.outcome),
            score: result.score,
            reason,
            evidence: result.evidence.clone(),
            error: result.error.clone(),
        }
    }
}

/// Map every rule result, preserving snapshot order
pub fn map_results(result: &RunResult) -> Vec<RuleResultRecord> {
    result
        .results
        .iter()
        .enumerate()
        .map(|(order, r)| RuleResultRecord::from_result(order, r))
        .collect()
}

/// Per-status rule counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCounts {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub not_evaluated: usize,
}

impl RuleCounts {
    pub fn from_records(records: &[RuleResultRecord]) -> Self {
        records.iter().fold(Self::default(), |mut counts, record| {
            counts.total += 1;
            match record.status {
                RuleStatus::Pass => counts.passed += 1,
                RuleStatus::Fail => counts.failed += 1,
                RuleStatus::Error => counts.errored += 1,
                RuleStatus::NotEvaluated => counts.not_evaluated += 1,
            }
            counts
        })
    }
}
