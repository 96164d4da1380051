//! Handlers for bulk review actions.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use sitecheck_core::bulk::{BulkAction, BulkParams};
use sitecheck_core::types::DbId;
use sitecheck_engine::bulk::BulkOperations;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::actor::RequestActor;
use crate::query::LimitParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /bulk`.
#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub action: BulkAction,
    pub target_ids: Vec<DbId>,
    #[serde(flatten)]
    pub params: BulkParams,
}

/// POST /api/v1/projects/{project_id}/bulk
///
/// Always 200 once the target list is valid; each target reports its own
/// outcome in `results`.
pub async fn apply_bulk(
    RequestActor(actor): RequestActor,
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Json(input): Json<BulkRequest>,
) -> AppResult<impl IntoResponse> {
    let result = BulkOperations::apply_bulk(
        &state.pool,
        project_id,
        input.action,
        &input.target_ids,
        &actor,
        &input.params,
    )
    .await?;
    Ok(Json(DataResponse { data: result }))
}

/// GET /api/v1/projects/{project_id}/bulk?limit=
pub async fn list_bulk_logs(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Query(params): Query<LimitParams>,
) -> AppResult<impl IntoResponse> {
    let logs = BulkOperations::list_logs(&state.pool, project_id, params.limit).await?;
    Ok(Json(DataResponse { data: logs }))
}

/// GET /api/v1/projects/{project_id}/bulk/{bulk_action_id}
pub async fn get_bulk_log(
    State(state): State<AppState>,
    Path((project_id, bulk_action_id)): Path<(DbId, Uuid)>,
) -> AppResult<impl IntoResponse> {
    let log = BulkOperations::find_log(&state.pool, project_id, bulk_action_id).await?;
    Ok(Json(DataResponse { data: log }))
}
