//! Cross-cutting layers for the router
use crate::state::AppState;
use axum::extract::State;
use axum::middleware::Next;
use axum::{body::Body, http::Request, response::Response};
use tower_http::cors::CorsLayer;

pub fn cors() -> CorsLayer {
    CorsLayer::permissive()
}

/// Count every response by method and status code
pub async fn count_requests(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let method = req.method().to_string();
    let response = next.run(req).await;
    state
        .metrics
        .requests
        .with_label_values(&[method.as_str(), response.status().as_str()])
        .inc();
    response
}
