//! QC Engine - rule definitions and deterministic evaluation
//!
//! The engine turns a [`NormalizedInput`](qc_core::NormalizedInput) and an
//! admitted [`RuleSnapshot`] into a [`RunResult`]:
//!
//! - [`rule`]: the closed set of rule types and admission validation
//! - [`evaluate`]: per-rule dispatch and weighted aggregation
//! - [`options`]: pass threshold and blocker behaviour

pub mod engine;
pub mod evaluators;
pub mod options;
pub mod result;
pub mod rule;

pub use engine::{evaluate, EngineError};
pub use evaluators::{parse_timestamp, Check, RuleFault};
pub use options::EngineOptions;
pub use result::{OverallOutcome, RuleOutcome, RuleResult, RunResult, RunSummary};
pub use rule::{
    build_regex, AllCapsParams, AudioDurationParams, ImpliedAbuseParams, KeywordBlacklistParams,
    NumericRangeParams, PatternError, RequiredColumnsParams, RequiredFieldParams,
    RequiredPhraseParams, RuleDefinition, RuleKind, RuleSnapshot, RuleType, RuleValidationError,
    SlaTimeDifferenceParams, TextRegexParams, ToneParams,
};
