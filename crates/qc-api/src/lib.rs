//! QC API /v1: REST endpoints
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod state;
pub mod templates;

pub use error::ApiError;
pub use state::AppState;
pub use templates::{TemplateCatalog, TemplateError};

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/v1/evaluate", post(handlers::evaluate))
        .route("/v1/segment", post(handlers::segment))
        .route("/v1/runs", post(handlers::create_run))
        .route("/v1/runs/{run_id}", get(handlers::get_run))
        .route("/v1/runs/{run_id}/result", get(handlers::get_result))
        .route("/v1/runs/{run_id}/cancel", post(handlers::cancel_run))
        .route("/v1/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::count_requests,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::cors())
        .with_state(state)
}

pub async fn run(addr: &str, state: AppState) -> std::io::Result<()> {
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("QC API listening on {}", addr);
    axum::serve(listener, app).await
}
