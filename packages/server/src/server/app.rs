//! Application setup and router assembly.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::kernel::deps::SearchDeps;
use crate::server::routes::{admin, health, jobs, stream};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub deps: Arc<SearchDeps>,
}

/// Build the axum application router.
pub fn build_app(deps: Arc<SearchDeps>) -> Router {
    let state = AppState { deps };

    let job_routes = Router::new()
        .route("/api/jobs/:job_id/start", post(jobs::start_handler))
        .route("/api/jobs/:job_id/status", get(jobs::status_handler))
        .route("/api/jobs/:job_id/results", get(jobs::results_handler))
        .route("/api/jobs/:job_id/followup", get(jobs::followup_handler))
        .route("/api/jobs/:job_id/resume", post(jobs::resume_handler))
        .route("/api/jobs/:job_id/cancel", post(jobs::cancel_handler))
        .route("/api/jobs/:job_id/stream", get(stream::stream_handler));

    let admin_routes = Router::new()
        .route("/api/search", post(admin::search_handler))
        .route("/api/jobs/list", get(admin::list_handler))
        .route("/api/jobs/recent", get(admin::recent_handler))
        .route("/api/backfill", post(admin::backfill_handler));

    admin_routes
        .merge(job_routes)
        .route("/health", get(health::health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
