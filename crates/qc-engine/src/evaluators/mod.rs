//! Pure per-type evaluators
//!
//! Each evaluator inspects only its slice of the input and returns a
//! [`Check`], or a [`RuleFault`] when the rule cannot be applied at all.

mod media;
mod record;
mod table;
mod text;
mod timestamp;

pub use timestamp::parse_timestamp;

use crate::rule::RuleKind;
use qc_core::{AiSignals, Evidence, InputKind, NormalizedInput};
use thiserror::Error;

/// Business verdict of a single evaluator
#[derive(Debug, Clone, PartialEq)]
pub enum Check {
    Pass(Vec<Evidence>),
    Fail(Vec<Evidence>),
    /// The rule does not apply (e.g. no signal supplied)
    NotApplicable(String),
}

/// Hard evaluation fault; converted to an ERROR outcome by the engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleFault {
    #[error("rule expects {expected} input but received {actual}")]
    InputMismatch {
        expected: &'static str,
        actual: InputKind,
    },
    #[error("pattern could not be compiled: {0}")]
    InvalidPattern(String),
}

impl RuleFault {
    pub(crate) fn mismatch(expected: &'static str, input: &NormalizedInput) -> Self {
        RuleFault::InputMismatch {
            expected,
            actual: input.kind(),
        }
    }
}

/// Dispatch a rule to its evaluator. The match is exhaustive so a new rule
/// type cannot be added without an evaluator.
pub(crate) fn dispatch(
    kind: &RuleKind,
    input: &NormalizedInput,
    signals: Option<&AiSignals>,
) -> Result<Check, RuleFault> {
    match kind {
        RuleKind::TextRegex(p) => text::regex(p, input),
        RuleKind::TextKeywordBlacklist(p) => text::keyword_blacklist(p, input),
        RuleKind::TextRequiredPhrase(p) => text::required_phrase(p, input),
        RuleKind::NumericRange(p) => record::numeric_range(p, input),
        RuleKind::RequiredField(p) => record::required_field(p, input),
        RuleKind::SlaTimeDifference(p) => record::sla_time_difference(p, input),
        RuleKind::ExcelAllCaps(p) => table::all_caps(p, input),
        RuleKind::ExcelRequiredColumns(p) => table::required_columns(p, input),
        RuleKind::AudioDurationLimit(p) => media::audio_duration(p, input),
        RuleKind::ToneClassification(p) => media::tone(p, signals),
        RuleKind::ImpliedAbuseDetection(p) => media::implied_abuse(p, signals),
    }
}
