//! Handlers for elements, their GUID remaps and history, milestone
//! recording, checkpoint groups and plan items.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use sitecheck_core::types::{DbId, Timestamp};
use sitecheck_db::models::element::{CreateCheckpointGroup, CreateElement};
use sitecheck_db::models::plan_item::CreatePlanItem;
use sitecheck_engine::lifecycle::ElementLifecycle;
use sitecheck_engine::workflow::InspectionWorkflow;
use validator::Validate;

use super::checkpoints::CheckpointView;
use crate::error::AppResult;
use crate::middleware::actor::RequestActor;
use crate::query::{LimitParams, PaginationParams};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /elements/remap`.
#[derive(Debug, Deserialize, Validate)]
pub struct RemapGuidRequest {
    #[validate(length(min = 1, max = 64))]
    pub old_guid: String,
    #[validate(length(min = 1, max = 64))]
    pub new_guid: String,
}

/// Request body for the arrival and installation milestones. A missing
/// `at` records the current time.
#[derive(Debug, Default, Deserialize)]
pub struct MilestoneRequest {
    pub at: Option<Timestamp>,
}

/// `?guid=` filter for plan items.
#[derive(Debug, Deserialize)]
pub struct PlanItemFilter {
    pub guid: Option<String>,
}

/// POST /api/v1/projects/{project_id}/elements
pub async fn create_element(
    RequestActor(actor): RequestActor,
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Json(input): Json<CreateElement>,
) -> AppResult<impl IntoResponse> {
    let element =
        ElementLifecycle::create_element(&state.pool, project_id, &input, &actor.name).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: element })))
}

/// GET /api/v1/projects/{project_id}/elements?limit=&offset=
pub async fn list_elements(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Query(params): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    let elements =
        ElementLifecycle::list_elements(&state.pool, project_id, params.limit, params.offset)
            .await?;
    Ok(Json(DataResponse { data: elements }))
}

/// GET /api/v1/projects/{project_id}/elements/{element_id}
pub async fn get_element(
    State(state): State<AppState>,
    Path((project_id, element_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    let element = ElementLifecycle::get_element(&state.pool, project_id, element_id).await?;
    Ok(Json(DataResponse { data: element }))
}

/// GET /api/v1/projects/{project_id}/elements/by-guid/{guid}
pub async fn get_element_by_guid(
    State(state): State<AppState>,
    Path((project_id, guid)): Path<(DbId, String)>,
) -> AppResult<impl IntoResponse> {
    let element = ElementLifecycle::find_by_guid(&state.pool, project_id, &guid).await?;
    Ok(Json(DataResponse { data: element }))
}

/// POST /api/v1/projects/{project_id}/elements/remap
///
/// Rename an element's GUID and rewrite every record that references it,
/// all or nothing.
pub async fn remap_guid(
    RequestActor(actor): RequestActor,
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Json(input): Json<RemapGuidRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let element_id = ElementLifecycle::remap_guid(
        &state.pool,
        project_id,
        input.old_guid.trim(),
        input.new_guid.trim(),
        &actor.name,
    )
    .await?;
    let element = ElementLifecycle::get_element(&state.pool, project_id, element_id).await?;
    Ok(Json(DataResponse { data: element }))
}

/// GET /api/v1/projects/{project_id}/elements/{element_id}/history?limit=
///
/// Newest first. Without `limit` the full history is returned.
pub async fn element_history(
    State(state): State<AppState>,
    Path((project_id, element_id)): Path<(DbId, DbId)>,
    Query(params): Query<LimitParams>,
) -> AppResult<impl IntoResponse> {
    let mut history = ElementLifecycle::get_history(&state.pool, project_id, element_id).await?;
    let items = history
        .take(params.limit.map(|l| l.max(0) as usize))
        .await?;
    Ok(Json(DataResponse { data: items }))
}

/// POST /api/v1/projects/{project_id}/elements/{element_id}/arrival
pub async fn record_arrival(
    RequestActor(actor): RequestActor,
    State(state): State<AppState>,
    Path((project_id, element_id)): Path<(DbId, DbId)>,
    Json(input): Json<MilestoneRequest>,
) -> AppResult<impl IntoResponse> {
    let element = ElementLifecycle::record_arrival(
        &state.pool,
        project_id,
        element_id,
        input.at,
        &actor.name,
    )
    .await?;
    Ok(Json(DataResponse { data: element }))
}

/// POST /api/v1/projects/{project_id}/elements/{element_id}/installation
pub async fn record_installation(
    RequestActor(actor): RequestActor,
    State(state): State<AppState>,
    Path((project_id, element_id)): Path<(DbId, DbId)>,
    Json(input): Json<MilestoneRequest>,
) -> AppResult<impl IntoResponse> {
    let element = ElementLifecycle::record_installation(
        &state.pool,
        project_id,
        element_id,
        input.at,
        &actor.name,
    )
    .await?;
    Ok(Json(DataResponse { data: element }))
}

/// GET /api/v1/projects/{project_id}/elements/{element_id}/checkpoints
pub async fn element_checkpoints(
    State(state): State<AppState>,
    Path((project_id, element_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    let checkpoints =
        InspectionWorkflow::list_for_element(&state.pool, project_id, element_id).await?;
    let data: Vec<CheckpointView> = checkpoints.into_iter().map(CheckpointView::from).collect();
    Ok(Json(DataResponse { data }))
}

/// GET /api/v1/projects/{project_id}/elements/stats
pub async fn lifecycle_stats(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let stats = ElementLifecycle::lifecycle_stats(&state.pool, project_id).await?;
    Ok(Json(DataResponse { data: stats }))
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

/// POST /api/v1/projects/{project_id}/groups
pub async fn create_group(
    RequestActor(actor): RequestActor,
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Json(input): Json<CreateCheckpointGroup>,
) -> AppResult<impl IntoResponse> {
    let group = ElementLifecycle::create_group(&state.pool, project_id, &input, &actor.name).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: group })))
}

/// GET /api/v1/projects/{project_id}/groups
pub async fn list_groups(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let groups = ElementLifecycle::list_groups(&state.pool, project_id).await?;
    Ok(Json(DataResponse { data: groups }))
}

/// GET /api/v1/projects/{project_id}/groups/{group_id}/history?limit=
pub async fn group_history(
    State(state): State<AppState>,
    Path((project_id, group_id)): Path<(DbId, DbId)>,
    Query(params): Query<LimitParams>,
) -> AppResult<impl IntoResponse> {
    let mut history = ElementLifecycle::group_history(&state.pool, project_id, group_id).await?;
    let items = history
        .take(params.limit.map(|l| l.max(0) as usize))
        .await?;
    Ok(Json(DataResponse { data: items }))
}

// ---------------------------------------------------------------------------
// Plan items
// ---------------------------------------------------------------------------

/// POST /api/v1/projects/{project_id}/plan-items
pub async fn create_plan_item(
    RequestActor(actor): RequestActor,
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Json(input): Json<CreatePlanItem>,
) -> AppResult<impl IntoResponse> {
    let item =
        ElementLifecycle::create_plan_item(&state.pool, project_id, &input, &actor.name).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: item })))
}

/// GET /api/v1/projects/{project_id}/plan-items?guid=
pub async fn list_plan_items(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Query(filter): Query<PlanItemFilter>,
) -> AppResult<impl IntoResponse> {
    let items =
        ElementLifecycle::list_plan_items(&state.pool, project_id, filter.guid.as_deref()).await?;
    Ok(Json(DataResponse { data: items }))
}
