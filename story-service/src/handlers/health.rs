use crate::services::get_metrics;
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use service_core::error::AppError;

pub async fn index() -> &'static str {
    "Story relay backend is running!"
}

/// Liveness probe; does not depend on the generation API.
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "story-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness probe: 503 until the generation client is configured.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.generator.readiness() {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not_ready",
                "error": e.to_string()
            })),
        ),
    }
}

pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        get_metrics(),
    )
}

pub async fn not_found() -> AppError {
    AppError::NotFound(anyhow::anyhow!("Route not found"))
}
