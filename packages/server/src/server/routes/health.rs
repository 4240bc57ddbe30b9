use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::server::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    index: String,
}

/// Health check endpoint
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let index_status = match state.deps.index.recent(1).await {
        Ok(_) => "ok",
        Err(_) => "error",
    };

    let (status_code, overall) = if index_status == "ok" {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        status_code,
        Json(HealthResponse {
            status: overall.to_string(),
            index: index_status.to_string(),
        }),
    )
}
