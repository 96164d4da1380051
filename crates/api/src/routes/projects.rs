//! Route definitions for projects and their coordinate calibration.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{calibration, projects};
use crate::state::AppState;

/// Project routes plus the calibration and conversion routes scoped under
/// `/projects/{project_id}`.
///
/// ```text
/// GET    /projects                                            -> list_projects
/// POST   /projects                                            -> create_project
/// GET    /projects/{project_id}                               -> get_project
///
/// GET    /projects/{project_id}/calibration/points            -> list_points
/// POST   /projects/{project_id}/calibration/points            -> add_point
/// POST   /projects/{project_id}/calibration/points/{point_id}/deactivate
/// GET    /projects/{project_id}/calibration/transform         -> get_transform
/// GET    /projects/{project_id}/calibration/accuracy          -> accuracy_report
/// GET    /projects/{project_id}/calibration/settings          -> get_settings
/// PUT    /projects/{project_id}/calibration/settings          -> update_settings
/// POST   /projects/{project_id}/convert/model-to-gps          -> model_to_gps
/// POST   /projects/{project_id}/convert/gps-to-model          -> gps_to_model
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route("/projects/{project_id}", get(projects::get_project))
        .route(
            "/projects/{project_id}/calibration/points",
            get(calibration::list_points).post(calibration::add_point),
        )
        .route(
            "/projects/{project_id}/calibration/points/{point_id}/deactivate",
            post(calibration::deactivate_point),
        )
        .route(
            "/projects/{project_id}/calibration/transform",
            get(calibration::get_transform),
        )
        .route(
            "/projects/{project_id}/calibration/accuracy",
            get(calibration::accuracy_report),
        )
        .route(
            "/projects/{project_id}/calibration/settings",
            get(calibration::get_settings).put(calibration::update_settings),
        )
        .route(
            "/projects/{project_id}/convert/model-to-gps",
            post(calibration::model_to_gps),
        )
        .route(
            "/projects/{project_id}/convert/gps-to-model",
            post(calibration::gps_to_model),
        )
}
