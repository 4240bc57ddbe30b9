//! Global RPC: job allocation, listing, and index backfill.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::domains::search::{JobController, JobStatus, QuizResponses};
use crate::server::app::AppState;
use crate::server::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct SearchBody {
    pub client_id: String,
    pub quiz_responses: QuizResponses,
    #[serde(default)]
    pub driver_provider: Option<String>,
    #[serde(default)]
    pub swarm_provider: Option<String>,
}

/// POST /api/search — allocate a job id and start the search.
pub async fn search_handler(
    State(state): State<AppState>,
    Json(body): Json<SearchBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let job_id = Uuid::new_v4().to_string();

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

    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(started).map_err(anyhow::Error::from)?),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub status: Option<String>,
}

fn default_limit() -> i64 {
    20
}

/// GET /api/jobs/list?limit&offset&status
pub async fn list_handler(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let status = match params.status.as_deref() {
        Some(raw) => Some(
            raw.parse::<JobStatus>()
                .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        ),
        None => None,
    };

    let rows = state
        .deps
        .index
        .list(params.limit.clamp(1, 200), params.offset.max(0), status)
        .await
        .map_err(ApiError::Internal)?;

    Ok(Json(serde_json::json!({ "jobs": rows })))
}

#[derive(Debug, Deserialize)]
pub struct RecentParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

/// GET /api/jobs/recent?limit
pub async fn recent_handler(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let rows = state
        .deps
        .index
        .recent(params.limit.clamp(1, 200))
        .await
        .map_err(ApiError::Internal)?;

    Ok(Json(serde_json::json!({ "jobs": rows })))
}

#[derive(Debug, Deserialize)]
pub struct BackfillBody {
    pub job_ids: Vec<String>,
}

/// POST /api/backfill — rebuild index rows from each job's own store.
pub async fn backfill_handler(
    State(state): State<AppState>,
    Json(body): Json<BackfillBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let controller = JobController::new(state.deps.clone());
    let mut rebuilt = 0usize;
    let mut missing = Vec::new();

    for job_id in &body.job_ids {
        if !state.deps.stores.store_exists(job_id) {
            missing.push(job_id.clone());
            continue;
        }

        let pool = state
            .deps
            .stores
            .open(job_id)
            .await
            .map_err(ApiError::Internal)?;
        match controller.refresh_index(&pool, job_id).await {
            Ok(()) => rebuilt += 1,
            Err(e) => {
                warn!(job_id, error = %e, "backfill failed for job");
                missing.push(job_id.clone());
            }
        }
    }

    Ok(Json(serde_json::json!({
        "rebuilt": rebuilt,
        "missing": missing,
    })))
}
