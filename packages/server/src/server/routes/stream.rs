//! SSE streaming for live search progress.
//!
//! The stream opens with a `snapshot` event (current status, recent
//! available domains, the client's own idea if checked), then forwards
//! batch and status events from the hub.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::stream::{self, StreamExt};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::domains::search::JobController;
use crate::server::app::AppState;
use crate::server::error::ApiError;

/// GET /api/jobs/{id}/stream
pub async fn stream_handler(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let controller = JobController::new(state.deps.clone());
    let snapshot = controller.stream_snapshot(&job_id).await?;

    let rx = state.deps.stream_hub.subscribe(&job_id).await;

    let snapshot_event = Event::default()
        .event("snapshot")
        .data(serde_json::to_string(&snapshot).map_err(anyhow::Error::from)?);

    let live = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => {
                let data = serde_json::to_string(&event).ok()?;
                Some(Ok::<_, Infallible>(Event::default().event("update").data(data)))
            }
            Err(BroadcastStreamRecvError::Lagged(_)) => {
                Some(Ok(Event::default().event("lagged").data("{}")))
            }
        }
    });

    let stream = stream::once(async move { Ok::<_, Infallible>(snapshot_event) }).chain(live);

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
