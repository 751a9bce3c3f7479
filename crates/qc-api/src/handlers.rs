//! API Handlers
use crate::error::ApiError;
use crate::metrics;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use qc_core::{AiSignals, NormalizedInput, ENGINE_VERSION};
use qc_engine::{evaluate as run_engine, EngineOptions, RuleDefinition, RuleSnapshot, RunResult};
use qc_runs::{read_complete_result, CompleteResult, Run, RunMode, RunRequest};
use qc_segment::{SegmentationResult, Segmenter, SegmenterConfig};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    pub input: NormalizedInput,
    pub rules: Vec<RuleDefinition>,
    #[serde(default)]
    pub options: Option<EngineOptions>,
    #[serde(default)]
    pub signals: Option<AiSignals>,
}

/// Evaluate rules against an input without creating a run
pub async fn evaluate(
    State(state): State<AppState>,
    Json(payload): Json<EvaluateRequest>,
) -> Result<Json<RunResult>, ApiError> {
    let snapshot = RuleSnapshot::new(payload.rules)?;
    let options = payload
        .options
        .unwrap_or_else(|| state.orchestrator.config().engine.clone());

    let result = run_engine(
        &payload.input,
        snapshot.rules(),
        Utc::now(),
        payload.signals.as_ref(),
        &options,
    )?;
    state
        .metrics
        .evaluations
        .with_label_values(&[result.summary.overall_outcome.to_string().as_str()])
        .inc();
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRequest {
    pub text: String,
    #[serde(default)]
    pub config: Option<SegmenterConfig>,
}

pub async fn segment(
    State(state): State<AppState>,
    Json(payload): Json<SegmentRequest>,
) -> Json<SegmentationResult> {
    let config = payload
        .config
        .unwrap_or_else(|| state.orchestrator.config().segmenter.clone());
    let result = Segmenter::new(config).segment(&payload.text);
    state
        .metrics
        .segmentations
        .with_label_values(&[result.strategy.to_string().as_str()])
        .inc();
    Json(result)
}

/// Queue a run. SYNC runs are processed before responding; ASYNC runs are
/// processed in the background and answered with 202.
pub async fn create_run(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<(StatusCode, Json<Run>), ApiError> {
    let mode = request.mode;
    let run = state.orchestrator.submit(request).await?;

    match mode {
        RunMode::Sync => {
            let run = state.orchestrator.process(&run.run_id).await?;
            state.observe_run(&run);
            Ok((StatusCode::OK, Json(run)))
        }
        RunMode::Async => {
            let background = state.clone();
            let run_id = run.run_id.clone();
            tokio::spawn(async move {
                match background.orchestrator.process(&run_id).await {
                    Ok(run) => background.observe_run(&run),
                    Err(e) => warn!(run_id = %run_id, error = %e, "background run could not be processed"),
                }
            });
            Ok((StatusCode::ACCEPTED, Json(run)))
        }
    }
}

pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<Run>, ApiError> {
    Ok(Json(state.orchestrator.get_run(&run_id).await?))
}

/// Complete result of a SUCCEEDED run; 409 while it is still being written
pub async fn get_result(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<CompleteResult>, ApiError> {
    state.orchestrator.get_run(&run_id).await?;
    let result = read_complete_result(state.orchestrator.store().as_ref(), &run_id).await?;
    result
        .map(Json)
        .ok_or(ApiError::ResultNotReady(run_id))
}

pub async fn cancel_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let cancelled = state.orchestrator.cancel(&run_id).await?;
    let run = state.orchestrator.get_run(&run_id).await?;
    if cancelled {
        state.observe_run(&run);
    }
    Ok(Json(json!({ "cancelled": cancelled, "run": run })))
}

pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let body = metrics::encode(state.metrics.registry())?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}

pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "version": ENGINE_VERSION })),
    )
}
