//! Handlers for the offline upload queue.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use sitecheck_core::types::DbId;
use sitecheck_db::models::upload_queue::CreateUploadQueueItem;
use sitecheck_engine::upload_replay;

use crate::error::AppResult;
use crate::middleware::actor::RequestActor;
use crate::query::StatusFilter;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/projects/{project_id}/uploads
///
/// Queues the write for the replay worker under the caller's identity.
/// Resubmitting a known `client_ref` returns the existing item.
pub async fn submit_upload(
    RequestActor(actor): RequestActor,
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Json(input): Json<CreateUploadQueueItem>,
) -> AppResult<impl IntoResponse> {
    let item = upload_replay::submit(&state.pool, project_id, &input, &actor).await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: item })))
}

/// GET /api/v1/projects/{project_id}/uploads?status=
pub async fn list_uploads(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Query(filter): Query<StatusFilter>,
) -> AppResult<impl IntoResponse> {
    let items = upload_replay::list(&state.pool, project_id, filter.status.as_deref()).await?;
    Ok(Json(DataResponse { data: items }))
}

/// POST /api/v1/projects/{project_id}/uploads/{upload_id}/requeue
pub async fn requeue_upload(
    RequestActor(actor): RequestActor,
    State(state): State<AppState>,
    Path((project_id, upload_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    let item = upload_replay::requeue(&state.pool, project_id, upload_id).await?;
    tracing::info!(project_id, upload_id, actor = %actor.name, "Upload requeue requested");
    Ok(Json(DataResponse { data: item }))
}
