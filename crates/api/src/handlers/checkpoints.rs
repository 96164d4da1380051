//! Handlers for checkpoints, workflow transitions and inspection results.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use sitecheck_core::types::DbId;
use sitecheck_core::upload_queue::ResultInput;
use sitecheck_core::workflow::{TransitionRequest, WorkflowAction};
use sitecheck_db::models::checkpoint::{Checkpoint, CreateCheckpoint};
use sitecheck_engine::workflow::InspectionWorkflow;

use crate::error::AppResult;
use crate::middleware::actor::RequestActor;
use crate::query::{LimitParams, StatusFilter};
use crate::response::DataResponse;
use crate::state::AppState;

/// A checkpoint with the viewer color of its status.
#[derive(Debug, Serialize)]
pub struct CheckpointView {
    #[serde(flatten)]
    pub checkpoint: Checkpoint,
    pub color: &'static str,
}

impl From<Checkpoint> for CheckpointView {
    fn from(checkpoint: Checkpoint) -> Self {
        let color = checkpoint.color();
        Self { checkpoint, color }
    }
}

/// Request body for `POST /checkpoints/{checkpoint_id}/transitions`.
#[derive(Debug, Deserialize)]
pub struct TransitionBody {
    pub action: WorkflowAction,
    pub comment: Option<String>,
    pub assignee: Option<String>,
}

/// POST /api/v1/projects/{project_id}/checkpoints
pub async fn create_checkpoint(
    RequestActor(actor): RequestActor,
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Json(input): Json<CreateCheckpoint>,
) -> AppResult<impl IntoResponse> {
    let checkpoint =
        InspectionWorkflow::create_checkpoint(&state.pool, project_id, &input, &actor.name)
            .await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: CheckpointView::from(checkpoint),
        }),
    ))
}

/// GET /api/v1/projects/{project_id}/checkpoints?status=
pub async fn list_checkpoints(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Query(filter): Query<StatusFilter>,
) -> AppResult<impl IntoResponse> {
    let checkpoints =
        InspectionWorkflow::list_checkpoints(&state.pool, project_id, filter.status.as_deref())
            .await?;
    let data: Vec<CheckpointView> = checkpoints.into_iter().map(CheckpointView::from).collect();
    Ok(Json(DataResponse { data }))
}

/// GET /api/v1/projects/{project_id}/checkpoints/{checkpoint_id}
pub async fn get_checkpoint(
    State(state): State<AppState>,
    Path((project_id, checkpoint_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    let checkpoint =
        InspectionWorkflow::get_checkpoint(&state.pool, project_id, checkpoint_id).await?;
    Ok(Json(DataResponse {
        data: CheckpointView::from(checkpoint),
    }))
}

/// POST /api/v1/projects/{project_id}/checkpoints/{checkpoint_id}/transitions
///
/// A rejected action is a 422 (or 403 for a role violation) and changes
/// nothing.
pub async fn transition(
    RequestActor(actor): RequestActor,
    State(state): State<AppState>,
    Path((project_id, checkpoint_id)): Path<(DbId, DbId)>,
    Json(body): Json<TransitionBody>,
) -> AppResult<impl IntoResponse> {
    let request = TransitionRequest {
        action: body.action,
        comment: body.comment,
        assignee: body.assignee,
    };
    let checkpoint =
        InspectionWorkflow::transition(&state.pool, project_id, checkpoint_id, &request, &actor)
            .await?;
    Ok(Json(DataResponse {
        data: CheckpointView::from(checkpoint),
    }))
}

/// POST /api/v1/projects/{project_id}/checkpoints/{checkpoint_id}/results
pub async fn record_result(
    RequestActor(actor): RequestActor,
    State(state): State<AppState>,
    Path((project_id, checkpoint_id)): Path<(DbId, DbId)>,
    Json(input): Json<ResultInput>,
) -> AppResult<impl IntoResponse> {
    let result =
        InspectionWorkflow::record_result(&state.pool, project_id, checkpoint_id, &input, &actor)
            .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: result })))
}

/// GET /api/v1/projects/{project_id}/checkpoints/{checkpoint_id}/results
pub async fn list_results(
    State(state): State<AppState>,
    Path((project_id, checkpoint_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    let results = InspectionWorkflow::list_results(&state.pool, project_id, checkpoint_id).await?;
    Ok(Json(DataResponse { data: results }))
}

/// GET /api/v1/projects/{project_id}/checkpoints/{checkpoint_id}/history?limit=
pub async fn checkpoint_history(
    State(state): State<AppState>,
    Path((project_id, checkpoint_id)): Path<(DbId, DbId)>,
    Query(params): Query<LimitParams>,
) -> AppResult<impl IntoResponse> {
    let mut history = InspectionWorkflow::history(&state.pool, project_id, checkpoint_id).await?;
    let items = history
        .take(params.limit.map(|l| l.max(0) as usize))
        .await?;
    Ok(Json(DataResponse { data: items }))
}
