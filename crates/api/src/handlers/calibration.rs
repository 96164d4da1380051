//! Handlers for calibration points, the project transform and coordinate
//! conversion.
//!
//! All routes are scoped under `/projects/{project_id}`.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use sitecheck_core::geo::{GpsCoord, ModelCoord};
use sitecheck_core::types::DbId;
use sitecheck_db::models::calibration::CreateCalibrationPoint;
use sitecheck_engine::calibration_store::CalibrationStore;
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::actor::RequestActor;
use crate::query::IncludeInactiveParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /calibration/points`.
#[derive(Debug, Deserialize, Validate)]
pub struct AddPointRequest {
    pub model: ModelCoord,
    pub gps: GpsCoord,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub element_guid: Option<String>,
}

/// Request body for `PUT /calibration/settings`.
#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub coordinate_system: String,
    pub model_unit: Option<String>,
}

/// POST /api/v1/projects/{project_id}/calibration/points
///
/// Capture a reference point. A poor GPS sample is still stored; the
/// response then carries a `notice`.
pub async fn add_point(
    RequestActor(actor): RequestActor,
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Json(input): Json<AddPointRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let added = CalibrationStore::add_point(
        &state.pool,
        project_id,
        &CreateCalibrationPoint {
            model: input.model,
            gps: input.gps,
            description: input.description,
            element_guid: input.element_guid,
            captured_by: actor.name,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: added })))
}

/// GET /api/v1/projects/{project_id}/calibration/points?include_inactive=
pub async fn list_points(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Query(params): Query<IncludeInactiveParams>,
) -> AppResult<impl IntoResponse> {
    let points =
        CalibrationStore::list_points(&state.pool, project_id, params.include_inactive).await?;
    Ok(Json(DataResponse { data: points }))
}

/// POST /api/v1/projects/{project_id}/calibration/points/{point_id}/deactivate
///
/// Idempotent: deactivating an inactive point returns it unchanged.
pub async fn deactivate_point(
    RequestActor(actor): RequestActor,
    State(state): State<AppState>,
    Path((project_id, point_id)): Path<(DbId, DbId)>,
) -> AppResult<impl IntoResponse> {
    let point =
        CalibrationStore::deactivate_point(&state.pool, project_id, point_id, &actor.name).await?;
    Ok(Json(DataResponse { data: point }))
}

/// GET /api/v1/projects/{project_id}/calibration/transform
///
/// `{"status": "not_calibrated", ...}` is a normal answer, not an error.
pub async fn get_transform(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let status = CalibrationStore::get_transform(&state.pool, project_id).await?;
    Ok(Json(DataResponse { data: status }))
}

/// GET /api/v1/projects/{project_id}/calibration/accuracy
pub async fn accuracy_report(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let report = CalibrationStore::accuracy_report(&state.pool, project_id).await?;
    Ok(Json(DataResponse { data: report }))
}

/// GET /api/v1/projects/{project_id}/calibration/settings
pub async fn get_settings(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let settings = CalibrationStore::settings(&state.pool, project_id).await?;
    Ok(Json(DataResponse { data: settings }))
}

/// PUT /api/v1/projects/{project_id}/calibration/settings
pub async fn update_settings(
    RequestActor(actor): RequestActor,
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Json(input): Json<UpdateSettingsRequest>,
) -> AppResult<impl IntoResponse> {
    let settings = CalibrationStore::set_coordinate_system(
        &state.pool,
        project_id,
        &input.coordinate_system,
        input.model_unit.as_deref(),
    )
    .await?;
    tracing::debug!(project_id, actor = %actor.name, "Coordinate settings updated");
    Ok(Json(DataResponse { data: settings }))
}

/// POST /api/v1/projects/{project_id}/convert/model-to-gps
pub async fn model_to_gps(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Json(model): Json<ModelCoord>,
) -> AppResult<impl IntoResponse> {
    let gps = CalibrationStore::convert_model_to_gps(&state.pool, project_id, &model).await?;
    Ok(Json(DataResponse { data: gps }))
}

/// POST /api/v1/projects/{project_id}/convert/gps-to-model
pub async fn gps_to_model(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Json(gps): Json<GpsCoord>,
) -> AppResult<impl IntoResponse> {
    let model = CalibrationStore::convert_gps_to_model(&state.pool, project_id, &gps).await?;
    Ok(Json(DataResponse { data: model }))
}
