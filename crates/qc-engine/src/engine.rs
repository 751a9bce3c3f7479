//! Rule evaluation engine
//!
//! Runs every rule of a snapshot against one normalized input and folds the
//! per-rule verdicts into a weighted run summary. Evaluation is pure: the
//! same input, rules, timestamp, signals and options always produce the same
//! [`RunResult`].

use crate::evaluators::{self, Check, RuleFault};
use crate::options::EngineOptions;
use crate::result::{OverallOutcome, RuleOutcome, RuleResult, RunResult, RunSummary};
use crate::rule::RuleDefinition;
use chrono::{DateTime, Utc};
use qc_core::{AiSignals, Evidence, EvidenceKind, NormalizedInput, PublicError, Severity, ENGINE_VERSION};
use serde_json::json;
use thiserror::Error;

/// Engine-level configuration errors, raised before any rule runs
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("pass score threshold must be a finite number in [0, 1], got {0}")]
    InvalidThreshold(f64),
}

/// Evaluate `rules` in order against `input`.
pub fn evaluate(
    input: &NormalizedInput,
    rules: &[RuleDefinition],
    executed_at: DateTime<Utc>,
    signals: Option<&AiSignals>,
    options: &EngineOptions,
) -> Result<RunResult, EngineError> {
    let threshold = options.pass_score_threshold;
    if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
        return Err(EngineError::InvalidThreshold(threshold));
    }

    let results: Vec<RuleResult> = rules
        .iter()
        .map(|rule| evaluate_rule(rule, input, signals))
        .collect();

    let overall_score = weighted_score(&results);
    let failed_rule_ids: Vec<String> = results
        .iter()
        .filter(|r| r.is_failure())
        .map(|r| r.rule_id.clone())
        .collect();

    let blocker_failed = results
        .iter()
        .any(|r| r.is_failure() && r.severity == Severity::Blocker);

    let overall_outcome =
        if (options.blocker_failure_forces_fail && blocker_failed) || overall_score < threshold {
            OverallOutcome::Fail
        } else {
            OverallOutcome::Pass
        };

    Ok(RunResult {
        summary: RunSummary {
            engine_version: ENGINE_VERSION.to_string(),
            executed_at,
            overall_outcome,
            overall_score,
            failed_rule_ids,
        },
        results,
    })
}

fn evaluate_rule(
    rule: &RuleDefinition,
    input: &NormalizedInput,
    signals: Option<&AiSignals>,
) -> RuleResult {
    if !rule.enabled {
        return RuleResult::skip(rule, "Rule is disabled");
    }

    match evaluators::dispatch(&rule.kind, input, signals) {
        Ok(Check::Pass(evidence)) => RuleResult::pass(rule, evidence),
        Ok(Check::Fail(evidence)) => RuleResult::fail(rule, evidence),
        Ok(Check::NotApplicable(reason)) => RuleResult::skip(rule, reason),
        Err(fault) => fault_result(rule, fault),
    }
}

fn fault_result(rule: &RuleDefinition, fault: RuleFault) -> RuleResult {
    match fault {
        RuleFault::InputMismatch { expected, actual } => RuleResult::error(
            rule,
            PublicError::rule_evaluation(
                "RULE_INPUT_MISMATCH",
                "This rule cannot be applied to the submitted input type",
            ),
            vec![Evidence::new(
                EvidenceKind::Error,
                format!("Expected {} input, received {}", expected, actual),
            )
            .with_meta(json!({ "expected": expected, "actual": actual }))],
        ),
        RuleFault::InvalidPattern(_) => RuleResult::error(
            rule,
            PublicError::rule_evaluation(
                "RULE_EVALUATION_FAILED",
                "This rule could not be evaluated",
            ),
            vec![Evidence::new(EvidenceKind::Error, "Rule pattern is invalid")],
        ),
    }
}

/// Weighted mean over non-skipped rules; vacuously 1 when nothing carries
/// weight.
fn weighted_score(results: &[RuleResult]) -> f64 {
    let (total, earned) = results
        .iter()
        .filter(|r| r.outcome != RuleOutcome::Skip)
        .fold((0.0, 0.0), |(total, earned), r| {
            (total + r.weight, earned + r.score * r.weight)
        });

    if total <= 0.0 {
        1.0
    } else {
        (earned / total).clamp(0.0, 1.0)
    }
}
