//! Job-scoped RPC.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::domains::search::{JobController, QuizResponses};
use crate::server::app::AppState;
use crate::server::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct StartBody {
    pub client_id: String,
    pub quiz_responses: QuizResponses,
    #[serde(default)]
    pub driver_provider: Option<String>,
    #[serde(default)]
    pub swarm_provider: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResumeBody {
    pub followup_responses: serde_json::Value,
}

/// POST /api/jobs/{id}/start — 201, or 409 when the job already exists.
pub async fn start_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Json(body): Json<StartBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let controller = JobController::new(state.deps.clone());
    let started = controller
        .start(
            &job_id,
            &body.client_id,
            body.quiz_responses,
            body.driver_provider,
            body.swarm_provider,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(serde_json::to_value(started).map_err(anyhow::Error::from)?)))
}

/// GET /api/jobs/{id}/status
pub async fn status_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let controller = JobController::new(state.deps.clone());
    let snapshot = controller.status(&job_id).await?;
    Ok(Json(serde_json::to_value(snapshot).map_err(anyhow::Error::from)?))
}

/// GET /api/jobs/{id}/results
pub async fn results_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let controller = JobController::new(state.deps.clone());
    let results = controller.results(&job_id).await?;
    Ok(Json(serde_json::to_value(results).map_err(anyhow::Error::from)?))
}

/// GET /api/jobs/{id}/followup — 404 when no quiz has been generated.
pub async fn followup_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let controller = JobController::new(state.deps.clone());
    let quiz = controller.followup(&job_id).await?;
    Ok(Json(quiz))
}

/// POST /api/jobs/{id}/resume — 400 unless status is needs_followup.
pub async fn resume_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    Json(body): Json<ResumeBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let controller = JobController::new(state.deps.clone());
    let snapshot = controller.resume(&job_id, body.followup_responses).await?;
    Ok(Json(serde_json::to_value(snapshot).map_err(anyhow::Error::from)?))
}

/// POST /api/jobs/{id}/cancel — 400 when already terminal.
pub async fn cancel_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let controller = JobController::new(state.deps.clone());
    controller.cancel(&job_id).await?;
    Ok(Json(serde_json::json!({ "status": "cancelled" })))
}
