//! Run lifecycle model

use chrono::{DateTime, Utc};
use qc_core::{InputFingerprint, NormalizedInput, PublicError, ENGINE_VERSION};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RunStatus::Queued => write!(f, "QUEUED"),
            RunStatus::Running => write!(f, "RUNNING"),
            RunStatus::Succeeded => write!(f, "SUCCEEDED"),
            RunStatus::Failed => write!(f, "FAILED"),
            RunStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunMode {
    /// Caller waits for the terminal state
    Sync,
    /// Caller polls
    Async,
}

/// Where the run's input comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputSource {
    Inline {
        input: NormalizedInput,
    },
    #[serde(rename_all = "camelCase")]
    Upload {
        storage_path: String,
    },
    #[serde(rename_all = "camelCase")]
    Integration {
        integration_type: String,
        #[serde(default)]
        config: Value,
        /// Reference resolved by the secret accessor; never the secret itself
        secret_ref: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        query: Option<Value>,
    },
}

impl InputSource {
    /// Human-readable pointer stored on the run
    pub fn reference(&self) -> Option<String> {
        match self {
            InputSource::Inline { .. } => None,
            InputSource::Upload { storage_path } => Some(storage_path.clone()),
            InputSource::Integration {
                integration_type, ..
            } => Some(format!("integration:{}", integration_type)),
        }
    }
}

/// Request to queue a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub tenant_id: String,
    pub template_id: String,
    pub template_version: u32,
    pub template_version_id: String,
    #[serde(default = "default_mode")]
    pub mode: RunMode,
    pub input_source: InputSource,
    /// Fingerprint declared by the uploader, verified against the bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_fingerprint: Option<InputFingerprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
}

fn default_mode() -> RunMode {
    RunMode::Sync
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub run_id: String,
    pub tenant_id: String,
    pub status: RunStatus,
    pub mode: RunMode,
    pub template_id: String,
    pub template_version: u32,
    pub template_version_id: String,
    pub input_source: InputSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_fingerprint: Option<InputFingerprint>,
    pub engine_version: String,
    pub requested_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<PublicError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_id: Option<String>,
}

impl Run {
    /// New QUEUED run with a fresh id
    pub fn queued(request: RunRequest, requested_at: DateTime<Utc>) -> Self {
        Self::queued_with_id(Uuid::new_v4().to_string(), request, requested_at)
    }

    pub fn queued_with_id(
        run_id: impl Into<String>,
        request: RunRequest,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            tenant_id: request.tenant_id,
            status: RunStatus::Queued,
            mode: request.mode,
            template_id: request.template_id,
            template_version: request.template_version,
            template_version_id: request.template_version_id,
            input_ref: request.input_source.reference(),
            input_source: request.input_source,
            input_fingerprint: request.input_fingerprint,
            engine_version: ENGINE_VERSION.to_string(),
            requested_at,
            requested_by: request.requested_by,
            started_at: None,
            completed_at: None,
            error: None,
            result_id: None,
        }
    }
}

/// Partial update applied by a conditional transition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunUpdate {
    pub status: Option<RunStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<PublicError>,
    pub result_id: Option<String>,
    pub input_fingerprint: Option<InputFingerprint>,
}

impl RunUpdate {
    pub fn status(status: RunStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    pub fn completed_at(mut self, at: DateTime<Utc>) -> Self {
        self.completed_at = Some(at);
        self
    }

    pub fn with_error(mut self, error: PublicError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_result(mut self, result_id: impl Into<String>) -> Self {
        self.result_id = Some(result_id.into());
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: InputFingerprint) -> Self {
        self.input_fingerprint = Some(fingerprint);
        self
    }

    pub fn apply(self, run: &mut Run) {
        if let Some(status) = self.status {
            run.status = status;
        }
        if self.started_at.is_some() {
            run.started_at = self.started_at;
        }
        if self.completed_at.is_some() {
            run.completed_at = self.completed_at;
        }
        if self.error.is_some() {
            run.error = self.error;
        }
        if self.result_id.is_some() {
            run.result_id = self.result_id;
        }
        if self.input_fingerprint.is_some() {
            run.input_fingerprint = self.input_fingerprint;
        }
    }
}
