//! Data Model: NormalizedInput, Evidence, Severity, AiSignals
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The engine's only view of a submission. Source-specific parsing happens
/// upstream in the format adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NormalizedInput {
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        locale: Option<String>,
    },
    Record {
        record: Map<String, Value>,
    },
    Table {
        columns: Vec<String>,
        #[serde(default)]
        rows: Vec<Map<String, Value>>,
    },
    Audio {
        #[serde(rename = "durationMs")]
        duration_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
}

impl NormalizedInput {
    pub fn text(text: impl Into<String>) -> Self {
        NormalizedInput::Text {
            text: text.into(),
            locale: None,
        }
    }

    pub fn record(record: Map<String, Value>) -> Self {
        NormalizedInput::Record { record }
    }

    pub fn kind(&self) -> InputKind {
        match self {
            NormalizedInput::Text { .. } => InputKind::Text,
            NormalizedInput::Record { .. } => InputKind::Record,
            NormalizedInput::Table { .. } => InputKind::Table,
            NormalizedInput::Audio { .. } => InputKind::Audio,
        }
    }

    /// Raw text when this is a text input
    pub fn as_text(&self) -> Option<&str> {
        match self {
            NormalizedInput::Text { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// Discriminant of [`NormalizedInput`], used in mismatch diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Text,
    Record,
    Table,
    Audio,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InputKind::Text => write!(f, "text"),
            InputKind::Record => write!(f, "record"),
            InputKind::Table => write!(f, "table"),
            InputKind::Audio => write!(f, "audio"),
        }
    }
}

/// Rule severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info = 0,
    Minor = 1,
    Major = 2,
    Blocker = 3,
}

impl Severity {
    /// A failed rule of this severity forces the run to FAIL
    pub fn is_blocking(&self) -> bool {
        matches!(self, Severity::Blocker)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Minor => write!(f, "MINOR"),
            Severity::Major => write!(f, "MAJOR"),
            Severity::Blocker => write!(f, "BLOCKER"),
        }
    }
}

/// A customer-safe explanation fragment attached to a rule result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Category of the fragment
    #[serde(rename = "type")]
    pub kind: EvidenceKind,
    /// Human-readable explanation
    pub message: String,
    /// Location inside the input the fragment refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Structured details (matched text, bounds, observed values)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl Evidence {
    pub fn new(kind: EvidenceKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            path: None,
            meta: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceKind {
    Skipped,
    PatternMatch,
    PatternMissing,
    KeywordHit,
    KeywordAbsent,
    PhraseFound,
    PhraseMissing,
    ValueInRange,
    ValueOutOfRange,
    FieldPresent,
    FieldMissing,
    ColumnCheck,
    DurationCheck,
    TimeDifference,
    Signal,
    Error,
}

/// Pre-computed classifier output supplied by an external signal provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSignals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<ToneSignal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implied_abuse: Option<AbuseSignal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToneSignal {
    pub label: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbuseSignal {
    pub confidence: f64,
}
