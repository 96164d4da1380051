//! Handlers for projects.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use sitecheck_core::error::CoreError;
use sitecheck_core::geo::{CoordinatePathway, ModelUnit};
use sitecheck_core::types::DbId;
use sitecheck_db::models::project::CreateProject;
use sitecheck_db::repositories::ProjectRepo;
use validator::Validate;

use crate::error::AppResult;
use crate::middleware::actor::RequestActor;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /projects`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub coordinate_system: Option<String>,
    pub model_unit: Option<String>,
}

/// POST /api/v1/projects
///
/// Create a project. The coordinate system defaults to the local
/// (calibrated) pathway with millimetre model units.
pub async fn create_project(
    RequestActor(actor): RequestActor,
    State(state): State<AppState>,
    Json(input): Json<CreateProjectRequest>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let coordinate_system = input
        .coordinate_system
        .as_deref()
        .map(CoordinatePathway::from_str_db)
        .transpose()?;
    let model_unit = input
        .model_unit
        .as_deref()
        .map(ModelUnit::from_str_db)
        .transpose()?;

    let project = ProjectRepo::create(
        &state.pool,
        &CreateProject {
            name: input.name.trim().to_string(),
            coordinate_system: coordinate_system.map(|c| c.as_str().to_string()),
            model_unit: model_unit.map(|u| u.as_str().to_string()),
        },
    )
    .await?;

    tracing::info!(project_id = project.id, actor = %actor.name, "Project created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: project })))
}

/// GET /api/v1/projects
pub async fn list_projects(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let projects = ProjectRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: projects }))
}

/// GET /api/v1/projects/{project_id}
pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let project = ProjectRepo::find_by_id(&state.pool, project_id)
        .await?
        .ok_or_else(|| CoreError::not_found("project", project_id))?;
    Ok(Json(DataResponse { data: project }))
}
