//! API errors and their HTTP mapping
//!
//! Every error body has the same shape, `{"error": PublicError}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use qc_core::{ErrorCategory, PublicError};
use qc_engine::{EngineError, RuleValidationError};
use qc_runs::{RunError, StoreError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Run(#[from] RunError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Rules(#[from] RuleValidationError),

    #[error("result for run {0} is not available yet")]
    ResultNotReady(String),

    #[error("metrics encoding failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Run(RunError::Store(err))
    }
}

impl ApiError {
    pub fn to_public(&self) -> PublicError {
        match self {
            ApiError::Run(err) => err.to_public(),
            ApiError::Engine(err) => {
                PublicError::validation("INVALID_ENGINE_OPTIONS", err.to_string())
            }
            ApiError::Rules(err) => PublicError::validation("INVALID_RULE", err.to_string())
                .with_help("Fix the rule definition and resubmit"),
            ApiError::ResultNotReady(_) => PublicError::validation(
                "RESULT_NOT_READY",
                "The run has not produced a complete result",
            ),
            ApiError::Metrics(_) => {
                PublicError::execution("METRICS_UNAVAILABLE", "Metrics could not be encoded")
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Run(RunError::RunNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::ResultNotReady(_) => StatusCode::CONFLICT,
            _ => status_for(&self.to_public()),
        }
    }
}

fn status_for(error: &PublicError) -> StatusCode {
    match error.category {
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::Integration => StatusCode::BAD_GATEWAY,
        ErrorCategory::RuleEvaluation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCategory::Execution => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(json!({ "error": self.to_public() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::Run(RunError::RunNotFound("r1".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Engine(EngineError::InvalidThreshold(2.0)).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::ResultNotReady("r1".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(StoreError::Unavailable("down".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
