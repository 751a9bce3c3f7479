//! Persisted result documents
//!
//! A result has a header document plus ordered rule records and, for
//! multi-chat runs, segment records with their own rule records. Record ids
//! are derived from content so re-driving an interrupted write overwrites
//! instead of duplicating.

use crate::mapper::RuleCounts;
use chrono::{DateTime, Utc};
use qc_core::InputFingerprint;
use qc_engine::OverallOutcome;
use qc_segment::{Participants, SegmentationStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteState {
    /// Dependent records are still being written
    Writing,
    Complete,
}

impl fmt::Display for WriteState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WriteState::Writing => write!(f, "WRITING"),
            WriteState::Complete => write!(f, "COMPLETE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub overall_outcome: OverallOutcome,
    pub overall_score: f64,
    pub failed_rule_ids: Vec<String>,
    pub rule_counts: RuleCounts,
    pub engine_version: String,
    pub executed_at: DateTime<Utc>,
}

/// What the result was computed from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integrity {
    pub template_version_id: String,
    pub template_version: u32,
    pub input_fingerprint: InputFingerprint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationInfo {
    pub strategy: SegmentationStrategy,
    pub segment_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultDocument {
    pub result_id: String,
    pub run_id: String,
    pub tenant_id: String,
    pub summary: ResultSummary,
    pub integrity: Integrity,
    pub write_state: WriteState,
    pub expected_rule_count: usize,
    pub expected_segment_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<SegmentationInfo>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ResultDocument {
    pub fn is_complete(&self) -> bool {
        self.write_state == WriteState::Complete
    }
}

/// One chat of a multi-chat run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRecord {
    pub segment_id: String,
    pub index: usize,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participants: Option<Participants>,
    pub summary: ResultSummary,
    /// Number of rule records in this segment's sub-collection
    pub rule_count: usize,
}

pub fn result_id_for(run_id: &str) -> String {
    format!("res_{}", run_id)
}

pub fn segment_id_for(index: usize) -> String {
    format!("seg_{:04}", index)
}

/// Deterministic rule record id: zero-padded order plus a hash of the rule id
pub fn rule_record_id(order: usize, rule_id: &str) -> String {
    let hash = blake3::hash(rule_id.as_bytes()).to_hex();
    format!("{:05}_{}", order, &hash.as_str()[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_ids_are_stable() {
        assert_eq!(rule_record_id(3, "greeting"), rule_record_id(3, "greeting"));
        assert_ne!(rule_record_id(3, "greeting"), rule_record_id(4, "greeting"));
        assert_ne!(rule_record_id(3, "greeting"), rule_record_id(3, "closing"));
        assert!(rule_record_id(12, "x").starts_with("00012_"));
        assert_eq!(result_id_for("r1"), "res_r1");
        assert_eq!(segment_id_for(2), "seg_0002");
    }
}
