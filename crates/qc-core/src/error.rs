//! Public error shape exposed at every boundary
//!
//! Internal errors are converted into [`PublicError`] exactly once. The
//! message is customer-safe: no secrets, stack traces or upstream payloads.
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Bad or missing references; never retryable
    Validation,
    /// Upstream connector failures
    Integration,
    /// Unexpected internal faults
    Execution,
    /// A single rule could not be evaluated
    RuleEvaluation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorCategory::Validation => write!(f, "VALIDATION"),
            ErrorCategory::Integration => write!(f, "INTEGRATION"),
            ErrorCategory::Execution => write!(f, "EXECUTION"),
            ErrorCategory::RuleEvaluation => write!(f, "RULE_EVALUATION"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicError {
    pub category: ErrorCategory,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    pub retryable: bool,
}

impl PublicError {
    fn new(category: ErrorCategory, code: impl Into<String>, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
            help: None,
            retryable,
        }
    }

    pub fn validation(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Validation, code, message, false)
    }

    pub fn integration(code: impl Into<String>, message: impl Into<String>, retryable: bool) -> Self {
        Self::new(ErrorCategory::Integration, code, message, retryable)
    }

    pub fn execution(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Execution, code, message, true)
    }

    pub fn rule_evaluation(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::RuleEvaluation, code, message, false)
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for PublicError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}: {}", self.category, self.code, self.message)
    }
}

impl std::error::Error for PublicError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_defaults() {
        assert!(!PublicError::validation("X", "bad").retryable);
        assert!(PublicError::execution("X", "boom").retryable);
        assert!(!PublicError::rule_evaluation("X", "rule").retryable);
        assert!(!PublicError::integration("X", "cfg", false).retryable);
    }

    #[test]
    fn test_display_and_wire() {
        let err = PublicError::validation("TEMPLATE_VERSION_NOT_FOUND", "Template version not found")
            .with_help("Check the template version id");
        assert_eq!(
            err.to_string(),
            "VALIDATION/TEMPLATE_VERSION_NOT_FOUND: Template version not found"
        );
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["category"], "VALIDATION");
        assert_eq!(json["retryable"], false);
    }
}
