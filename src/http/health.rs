use crate::http::AppState;
use crate::repositories::HealthCheck;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

pub async fn health<R>(State(state): State<AppState<R>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": state.version,
        "uptime": state.started_at.elapsed().as_secs(),
    }))
}

pub async fn ready<R: HealthCheck>(State(state): State<AppState<R>>) -> impl IntoResponse {
    if let Err(err) = state.repo.ping().await {
        tracing::warn!(error = ?err, "readiness probe failed");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "unhealthy",
                "db": { "status": "down" },
            })),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "status": "ready",
            "version": state.version,
            "uptime": state.started_at.elapsed().as_secs(),
            "db": { "status": "up" },
        })),
    )
}
