//! Rule results and run summaries
//!
//! Results are built through one constructor per outcome so the optional
//! fields (error, skip reason) are always consistent with the outcome.

use crate::rule::{RuleDefinition, RuleType};
use chrono::{DateTime, Utc};
use qc_core::{Evidence, EvidenceKind, PublicError, Severity};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of one rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleOutcome {
    Pass,
    Fail,
    /// Disabled or not applicable; excluded from the weighted score
    Skip,
    /// Evaluation itself faulted; scores 0
    Error,
}

impl fmt::Display for RuleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RuleOutcome::Pass => write!(f, "PASS"),
            RuleOutcome::Fail => write!(f, "FAIL"),
            RuleOutcome::Skip => write!(f, "SKIP"),
            RuleOutcome::Error => write!(f, "ERROR"),
        }
    }
}

/// Per-rule verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleResult {
    pub rule_id: String,
    pub rule_name: String,
    pub version: u32,
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    pub severity: Severity,
    pub weight: f64,
    pub outcome: RuleOutcome,
    /// In [0, 1]
    pub score: f64,
    pub evidence: Vec<Evidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PublicError>,
}

impl RuleResult {
    fn base(rule: &RuleDefinition, outcome: RuleOutcome, score: f64, evidence: Vec<Evidence>) -> Self {
        Self {
            rule_id: rule.rule_id.clone(),
            rule_name: rule.name.clone(),
            version: rule.version,
            rule_type: rule.rule_type(),
            severity: rule.severity,
            weight: rule.weight,
            outcome,
            score,
            evidence,
            error: None,
        }
    }

    pub fn pass(rule: &RuleDefinition, evidence: Vec<Evidence>) -> Self {
        Self::base(rule, RuleOutcome::Pass, 1.0, evidence)
    }

    pub fn fail(rule: &RuleDefinition, evidence: Vec<Evidence>) -> Self {
        Self::base(rule, RuleOutcome::Fail, 0.0, evidence)
    }

    pub fn skip(rule: &RuleDefinition, reason: impl Into<String>) -> Self {
        Self::base(
            rule,
            RuleOutcome::Skip,
            1.0,
            vec![Evidence::new(EvidenceKind::Skipped, reason)],
        )
    }

    pub fn error(rule: &RuleDefinition, error: PublicError, evidence: Vec<Evidence>) -> Self {
        let mut result = Self::base(rule, RuleOutcome::Error, 0.0, evidence);
        result.error = Some(error);
        result
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == RuleOutcome::Fail
    }
}

/// Overall run verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallOutcome {
    Pass,
    Fail,
}

impl fmt::Display for OverallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OverallOutcome::Pass => write!(f, "PASS"),
            OverallOutcome::Fail => write!(f, "FAIL"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub engine_version: String,
    pub executed_at: DateTime<Utc>,
    pub overall_outcome: OverallOutcome,
    pub overall_score: f64,
    pub failed_rule_ids: Vec<String>,
}

/// Output of one engine invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub summary: RunSummary,
    pub results: Vec<RuleResult>,
}

impl RunResult {
    pub fn passed(&self) -> bool {
        self.summary.overall_outcome == OverallOutcome::Pass
    }

    pub fn result(&self, rule_id: &str) -> Option<&RuleResult> {
        self.results.iter().find(|r| r.rule_id == rule_id)
    }
}
