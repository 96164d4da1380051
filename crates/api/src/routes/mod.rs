pub mod elements;
pub mod health;
pub mod inspections;
pub mod projects;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Every mutating route requires the `x-actor-id` and `x-actor-role`
/// headers. Project-scoped resources live under `/projects/{project_id}`:
///
/// ```text
/// /projects                                   projects
/// /projects/{project_id}/calibration/...      points, transform, accuracy, settings
/// /projects/{project_id}/convert/...          model <-> GPS conversion
/// /projects/{project_id}/elements/...         elements, remap, history, milestones
/// /projects/{project_id}/groups               checkpoint groups
/// /projects/{project_id}/plan-items           plan items
/// /projects/{project_id}/checkpoints/...      checkpoints, transitions, results
/// /projects/{project_id}/bulk/...             bulk review actions
/// /projects/{project_id}/audit                audit log query
/// /projects/{project_id}/uploads/...          offline upload queue
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(projects::router())
        .merge(elements::router())
        .merge(inspections::router())
}
