//! Run failures and their customer-safe form

use crate::aggregate::AggregationError;
use crate::collaborators::CollaboratorError;
use crate::store::StoreError;
use qc_core::PublicError;
use qc_engine::EngineError;
use thiserror::Error;

/// Anything that stops a run. Internal detail stays in the log; callers see
/// [`RunError::to_public`].
#[derive(Debug, Error)]
pub enum RunError {
    #[error("run {0} not found")]
    RunNotFound(String),

    #[error("template version {template_version_id} not found")]
    TemplateVersionNotFound { template_version_id: String },

    #[error("rule snapshot unavailable: {0}")]
    Snapshot(CollaboratorError),

    #[error("storage path {0} is outside the run's upload scope")]
    InvalidStoragePath(String),

    #[error("declared input fingerprint does not match uploaded bytes")]
    FingerprintMismatch,

    #[error("input could not be loaded: {0}")]
    InputLoad(CollaboratorError),

    #[error("secret could not be resolved: {0}")]
    Secret(CollaboratorError),

    #[error("no connector registered for integration {0}")]
    ConnectorNotConfigured(String),

    #[error("connector fetch failed: {0}")]
    Connector(CollaboratorError),

    #[error("input fingerprint could not be computed: {0}")]
    Fingerprint(#[from] serde_json::Error),

    #[error("engine rejected options: {0}")]
    Engine(#[from] EngineError),

    #[error("segment results could not be combined: {0}")]
    Aggregation(#[from] AggregationError),

    #[error("persistence failed: {0}")]
    Store(#[from] StoreError),
}

impl RunError {
    pub fn to_public(&self) -> PublicError {
        match self {
            RunError::RunNotFound(_) => {
                PublicError::validation("RUN_NOT_FOUND", "The requested run does not exist")
            }
            RunError::TemplateVersionNotFound { .. } => PublicError::validation(
                "TEMPLATE_VERSION_NOT_FOUND",
                "The template version bound to this run does not exist",
            )
            .with_help("Publish the template version or start a run against an existing one"),
            RunError::Snapshot(e) => PublicError::integration(
                "TEMPLATE_UNAVAILABLE",
                "The rule template could not be loaded",
                e.is_retryable(),
            ),
            RunError::InvalidStoragePath(_) => PublicError::validation(
                "INVALID_STORAGE_PATH",
                "The uploaded file is not stored under this run",
            ),
            RunError::FingerprintMismatch => PublicError::validation(
                "INPUT_FINGERPRINT_MISMATCH",
                "The uploaded file does not match its declared fingerprint",
            )
            .with_help("Upload the file again"),
            RunError::InputLoad(CollaboratorError::InvalidInput(_)) => PublicError::validation(
                "INPUT_UNREADABLE",
                "The submitted input could not be read",
            ),
            RunError::InputLoad(e) => PublicError::integration(
                "INPUT_LOAD_FAILED",
                "The submitted input could not be loaded",
                e.is_retryable(),
            ),
            RunError::Secret(e) => PublicError::integration(
                "CREDENTIALS_UNAVAILABLE",
                "Credentials for the integration could not be resolved",
                e.is_retryable(),
            ),
            RunError::ConnectorNotConfigured(_) => PublicError::integration(
                "CONNECTOR_NOT_CONFIGURED",
                "The requested integration is not configured",
                false,
            ),
            RunError::Connector(e) => PublicError::integration(
                "CONNECTOR_FETCH_FAILED",
                "The integration did not return usable data",
                e.is_retryable(),
            ),
            RunError::Fingerprint(_) => {
                PublicError::execution("FINGERPRINT_FAILED", "The input could not be fingerprinted")
            }
            RunError::Engine(_) => PublicError::validation(
                "INVALID_ENGINE_OPTIONS",
                "The evaluation options are invalid",
            ),
            RunError::Aggregation(_) => {
                PublicError::execution("AGGREGATION_FAILED", "Chat results could not be combined")
            }
            RunError::Store(_) => {
                PublicError::execution("PERSISTENCE_FAILED", "Results could not be saved")
            }
        }
    }
}
