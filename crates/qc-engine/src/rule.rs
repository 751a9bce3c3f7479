//! Rule definitions
//!
//! A closed set of rule variants sharing metadata (id, version, weight,
//! severity, enabled flag) with a fixed `params` shape per type. Definitions
//! are validated once at admission and frozen into a [`RuleSnapshot`].

use qc_core::{FieldPath, Severity};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// A single rule definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDefinition {
    /// Stable identifier across template versions
    pub rule_id: String,

    /// Positive revision number of this rule
    pub version: u32,

    /// Disabled rules are reported as SKIP
    #[serde(default = "default_true")]
    pub enabled: bool,

    pub severity: Severity,

    /// Contribution to the weighted score, in [0, 1]
    #[serde(default = "default_weight")]
    pub weight: f64,

    /// Human-readable name
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Type tag and parameters
    #[serde(flatten)]
    pub kind: RuleKind,
}

fn default_true() -> bool {
    true
}

fn default_weight() -> f64 {
    1.0
}

impl RuleDefinition {
    /// Create an enabled rule with weight 1
    pub fn new(rule_id: impl Into<String>, name: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            rule_id: rule_id.into(),
            version: 1,
            enabled: true,
            severity: Severity::Major,
            weight: 1.0,
            name: name.into(),
            description: None,
            tags: Vec::new(),
            kind,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn rule_type(&self) -> RuleType {
        self.kind.rule_type()
    }

    /// Admission-time validation
    pub fn validate(&self) -> Result<(), RuleValidationError> {
        let invalid = |reason: String| RuleValidationError::Invalid {
            rule_id: self.rule_id.clone(),
            reason,
        };

        if self.rule_id.trim().is_empty() {
            return Err(invalid("ruleId must not be empty".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty".to_string()));
        }
        if self.version == 0 {
            return Err(invalid("version must be positive".to_string()));
        }
        if !self.weight.is_finite() || !(0.0..=1.0).contains(&self.weight) {
            return Err(invalid(format!("weight {} must be within [0, 1]", self.weight)));
        }

        self.kind.validate().map_err(invalid)
    }
}

/// Type tag plus variant-specific parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleKind {
    TextRegex(TextRegexParams),
    TextKeywordBlacklist(KeywordBlacklistParams),
    TextRequiredPhrase(RequiredPhraseParams),
    NumericRange(NumericRangeParams),
    RequiredField(RequiredFieldParams),
    ExcelAllCaps(AllCapsParams),
    ExcelRequiredColumns(RequiredColumnsParams),
    AudioDurationLimit(AudioDurationParams),
    SlaTimeDifference(SlaTimeDifferenceParams),
    ToneClassification(ToneParams),
    ImpliedAbuseDetection(ImpliedAbuseParams),
}

impl RuleKind {
    pub fn rule_type(&self) -> RuleType {
        match self {
            RuleKind::TextRegex(_) => RuleType::TextRegex,
            RuleKind::TextKeywordBlacklist(_) => RuleType::TextKeywordBlacklist,
            RuleKind::TextRequiredPhrase(_) => RuleType::TextRequiredPhrase,
            RuleKind::NumericRange(_) => RuleType::NumericRange,
            RuleKind::RequiredField(_) => RuleType::RequiredField,
            RuleKind::ExcelAllCaps(_) => RuleType::ExcelAllCaps,
            RuleKind::ExcelRequiredColumns(_) => RuleType::ExcelRequiredColumns,
            RuleKind::AudioDurationLimit(_) => RuleType::AudioDurationLimit,
            RuleKind::SlaTimeDifference(_) => RuleType::SlaTimeDifference,
            RuleKind::ToneClassification(_) => RuleType::ToneClassification,
            RuleKind::ImpliedAbuseDetection(_) => RuleType::ImpliedAbuseDetection,
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            RuleKind::TextRegex(p) => {
                build_regex(&p.pattern, &p.flags).map_err(|e| e.to_string())?;
                check_optional_path(p.field_path.as_ref())
            }
            RuleKind::TextKeywordBlacklist(p) => {
                if p.keywords.is_empty() || p.keywords.iter().any(|k| k.is_empty()) {
                    return Err("keywords must be a non-empty list of non-empty strings".to_string());
                }
                check_optional_path(p.field_path.as_ref())
            }
            RuleKind::TextRequiredPhrase(p) => {
                if p.phrase.is_empty() {
                    return Err("phrase must not be empty".to_string());
                }
                check_optional_path(p.field_path.as_ref())
            }
            RuleKind::NumericRange(p) => {
                check_path(&p.field_path)?;
                if p.min.is_none() && p.max.is_none() {
                    return Err("at least one of min or max is required".to_string());
                }
                if p.min.map_or(false, |v| !v.is_finite()) || p.max.map_or(false, |v| !v.is_finite()) {
                    return Err("bounds must be finite numbers".to_string());
                }
                if let (Some(min), Some(max)) = (p.min, p.max) {
                    if min > max {
                        return Err(format!("min {} exceeds max {}", min, max));
                    }
                }
                Ok(())
            }
            RuleKind::RequiredField(p) => {
                if p.field_paths.is_empty() {
                    return Err("fieldPaths must not be empty".to_string());
                }
                p.field_paths.iter().try_for_each(check_path)
            }
            RuleKind::ExcelAllCaps(p) => {
                if !p.threshold.is_finite() || p.threshold <= 0.0 || p.threshold > 1.0 {
                    return Err(format!("threshold {} must be within (0, 1]", p.threshold));
                }
                Ok(())
            }
            RuleKind::ExcelRequiredColumns(p) => {
                if p.columns.is_empty() {
                    return Err("columns must not be empty".to_string());
                }
                Ok(())
            }
            RuleKind::AudioDurationLimit(p) => {
                if let Some(min) = p.min_duration_ms {
                    if min > p.max_duration_ms {
                        return Err(format!(
                            "minDurationMs {} exceeds maxDurationMs {}",
                            min, p.max_duration_ms
                        ));
                    }
                }
                Ok(())
            }
            RuleKind::SlaTimeDifference(p) => {
                check_path(&p.start_field_path)?;
                check_path(&p.end_field_path)
            }
            RuleKind::ToneClassification(p) => {
                if p.disallowed_labels.is_empty() {
                    return Err("disallowedLabels must not be empty".to_string());
                }
                check_unit_interval("minConfidence", p.min_confidence)
            }
            RuleKind::ImpliedAbuseDetection(p) => check_unit_interval("threshold", p.threshold),
        }
    }
}

fn check_path(path: &FieldPath) -> Result<(), String> {
    if path.is_empty() {
        Err("field path must not be empty".to_string())
    } else {
        Ok(())
    }
}

fn check_optional_path(path: Option<&FieldPath>) -> Result<(), String> {
    path.map_or(Ok(()), check_path)
}

fn check_unit_interval(name: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(format!("{} {} must be within [0, 1]", name, value))
    }
}

/// Flat rule type discriminant reported on results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    TextRegex,
    TextKeywordBlacklist,
    TextRequiredPhrase,
    NumericRange,
    RequiredField,
    ExcelAllCaps,
    ExcelRequiredColumns,
    AudioDurationLimit,
    SlaTimeDifference,
    ToneClassification,
    ImpliedAbuseDetection,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::TextRegex => "TEXT_REGEX",
            RuleType::TextKeywordBlacklist => "TEXT_KEYWORD_BLACKLIST",
            RuleType::TextRequiredPhrase => "TEXT_REQUIRED_PHRASE",
            RuleType::NumericRange => "NUMERIC_RANGE",
            RuleType::RequiredField => "REQUIRED_FIELD",
            RuleType::ExcelAllCaps => "EXCEL_ALL_CAPS",
            RuleType::ExcelRequiredColumns => "EXCEL_REQUIRED_COLUMNS",
            RuleType::AudioDurationLimit => "AUDIO_DURATION_LIMIT",
            RuleType::SlaTimeDifference => "SLA_TIME_DIFFERENCE",
            RuleType::ToneClassification => "TONE_CLASSIFICATION",
            RuleType::ImpliedAbuseDetection => "IMPLIED_ABUSE_DETECTION",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRegexParams {
    pub pattern: String,
    /// Any of `i`, `m`, `s`, `x`; `g` and `u` are accepted and ignored
    #[serde(default)]
    pub flags: String,
    /// When false, a match is a failure
    #[serde(default = "default_true")]
    pub must_match: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_path: Option<FieldPath>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordBlacklistParams {
    pub keywords: Vec<String>,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_path: Option<FieldPath>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredPhraseParams {
    pub phrase: String,
    #[serde(default)]
    pub case_sensitive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_path: Option<FieldPath>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericRangeParams {
    pub field_path: FieldPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default = "default_true")]
    pub inclusive_min: bool,
    #[serde(default = "default_true")]
    pub inclusive_max: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredFieldParams {
    pub field_paths: Vec<FieldPath>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllCapsParams {
    /// Columns to inspect; empty means every column
    #[serde(default)]
    pub columns: Vec<String>,
    /// Minimum uppercase ratio among alphabetic characters
    #[serde(default = "default_caps_threshold")]
    pub threshold: f64,
}

fn default_caps_threshold() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredColumnsParams {
    pub columns: Vec<String>,
    #[serde(default)]
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDurationParams {
    pub max_duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_duration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaTimeDifferenceParams {
    pub start_field_path: FieldPath,
    pub end_field_path: FieldPath,
    pub max_difference_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToneParams {
    pub disallowed_labels: Vec<String>,
    #[serde(default = "default_tone_confidence")]
    pub min_confidence: f64,
}

fn default_tone_confidence() -> f64 {
    0.7
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpliedAbuseParams {
    #[serde(default = "default_abuse_threshold")]
    pub threshold: f64,
}

fn default_abuse_threshold() -> f64 {
    0.5
}

/// Compile a pattern with JS-style flag letters
pub fn build_regex(pattern: &str, flags: &str) -> Result<Regex, PatternError> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            'x' => {
                builder.ignore_whitespace(true);
            }
            'g' | 'u' => {}
            other => return Err(PatternError::UnsupportedFlag(other)),
        }
    }
    builder.build().map_err(|e| PatternError::Invalid(e.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("unsupported regex flag '{0}'")]
    UnsupportedFlag(char),
    #[error("invalid regex: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleValidationError {
    #[error("rule '{rule_id}' is invalid: {reason}")]
    Invalid { rule_id: String, reason: String },
    #[error("duplicate rule id '{0}'")]
    DuplicateRuleId(String),
}

/// Immutable, validated list of rule definitions bound to a template version
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RuleSnapshot {
    rules: Vec<RuleDefinition>,
}

impl RuleSnapshot {
    pub fn new(rules: Vec<RuleDefinition>) -> Result<Self, RuleValidationError> {
        let mut seen = HashSet::new();
        for rule in &rules {
            rule.validate()?;
            if !seen.insert(rule.rule_id.as_str()) {
                return Err(RuleValidationError::DuplicateRuleId(rule.rule_id.clone()));
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[RuleDefinition] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<'de> Deserialize<'de> for RuleSnapshot {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let rules = Vec::<RuleDefinition>::deserialize(deserializer)?;
        RuleSnapshot::new(rules).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn phrase_rule(id: &str) -> RuleDefinition {
        RuleDefinition::new(
            id,
            "Mentions order id",
            RuleKind::TextRequiredPhrase(RequiredPhraseParams {
                phrase: "Order ID".to_string(),
                case_sensitive: false,
                field_path: None,
            }),
        )
    }

    #[test]
    fn test_wire_format_round_trip() {
        let rule: RuleDefinition = serde_json::from_value(json!({
            "ruleId": "no-refund",
            "version": 2,
            "severity": "BLOCKER",
            "name": "No refund promises",
            "type": "TEXT_KEYWORD_BLACKLIST",
            "params": { "keywords": ["refund"] }
        }))
        .unwrap();

        assert!(rule.enabled);
        assert_eq!(rule.weight, 1.0);
        assert_eq!(rule.rule_type(), RuleType::TextKeywordBlacklist);
        match &rule.kind {
            RuleKind::TextKeywordBlacklist(p) => assert!(!p.case_sensitive),
            other => panic!("unexpected kind {:?}", other),
        }

        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(value["type"], "TEXT_KEYWORD_BLACKLIST");
        assert_eq!(value["params"]["keywords"], json!(["refund"]));
    }

    #[test]
    fn test_numeric_defaults() {
        let kind: RuleKind = serde_json::from_value(json!({
            "type": "NUMERIC_RANGE",
            "params": { "fieldPath": ["amount"], "min": 0, "max": 10, "inclusiveMax": false }
        }))
        .unwrap();
        match kind {
            RuleKind::NumericRange(p) => {
                assert!(p.inclusive_min);
                assert!(!p.inclusive_max);
                assert_eq!(p.max, Some(10.0));
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_validation_rejects_bad_rules() {
        assert!(phrase_rule("ok").validate().is_ok());
        assert!(phrase_rule("w").with_weight(1.5).validate().is_err());
        assert!(phrase_rule("v").with_version(0).validate().is_err());

        let bad_regex = RuleDefinition::new(
            "re",
            "Broken",
            RuleKind::TextRegex(TextRegexParams {
                pattern: "(unclosed".to_string(),
                flags: String::new(),
                must_match: true,
                field_path: None,
            }),
        );
        assert!(bad_regex.validate().is_err());

        let inverted = RuleDefinition::new(
            "range",
            "Inverted",
            RuleKind::NumericRange(NumericRangeParams {
                field_path: FieldPath::parse("amount"),
                min: Some(5.0),
                max: Some(1.0),
                inclusive_min: true,
                inclusive_max: true,
            }),
        );
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_snapshot_rejects_duplicates() {
        let err = RuleSnapshot::new(vec![phrase_rule("a"), phrase_rule("a")]).unwrap_err();
        assert_eq!(err, RuleValidationError::DuplicateRuleId("a".to_string()));

        let snapshot = RuleSnapshot::new(vec![phrase_rule("a"), phrase_rule("b")]).unwrap();
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_regex_flags() {
        let re = build_regex("^hello", "im").unwrap();
        assert!(re.is_match("x\nHELLO"));
        assert_eq!(build_regex("a", "q").unwrap_err(), PatternError::UnsupportedFlag('q'));
    }
}
