//! Route definitions for elements, checkpoint groups and plan items.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::elements;
use crate::state::AppState;

/// Routes scoped under `/projects/{project_id}`.
///
/// ```text
/// GET    /elements                              -> list_elements
/// POST   /elements                              -> create_element
/// POST   /elements/remap                        -> remap_guid
/// GET    /elements/stats                        -> lifecycle_stats
/// GET    /elements/by-guid/{guid}               -> get_element_by_guid
/// GET    /elements/{element_id}                 -> get_element
/// GET    /elements/{element_id}/history         -> element_history
/// POST   /elements/{element_id}/arrival         -> record_arrival
/// POST   /elements/{element_id}/installation    -> record_installation
/// GET    /elements/{element_id}/checkpoints     -> element_checkpoints
///
/// GET    /groups                                -> list_groups
/// POST   /groups                                -> create_group
/// GET    /groups/{group_id}/history             -> group_history
/// GET    /plan-items                            -> list_plan_items
/// POST   /plan-items                            -> create_plan_item
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/projects/{project_id}/elements",
            get(elements::list_elements).post(elements::create_element),
        )
        .route(
            "/projects/{project_id}/elements/remap",
            post(elements::remap_guid),
        )
        .route(
            "/projects/{project_id}/elements/stats",
            get(elements::lifecycle_stats),
        )
        .route(
            "/projects/{project_id}/elements/by-guid/{guid}",
            get(elements::get_element_by_guid),
        )
        .route(
            "/projects/{project_id}/elements/{element_id}",
            get(elements::get_element),
        )
        .route(
            "/projects/{project_id}/elements/{element_id}/history",
            get(elements::element_history),
        )
        .route(
            "/projects/{project_id}/elements/{element_id}/arrival",
            post(elements::record_arrival),
        )
        .route(
            "/projects/{project_id}/elements/{element_id}/installation",
            post(elements::record_installation),
        )
        .route(
            "/projects/{project_id}/elements/{element_id}/checkpoints",
            get(elements::element_checkpoints),
        )
        .route(
            "/projects/{project_id}/groups",
            get(elements::list_groups).post(elements::create_group),
        )
        .route(
            "/projects/{project_id}/groups/{group_id}/history",
            get(elements::group_history),
        )
        .route(
            "/projects/{project_id}/plan-items",
            get(elements::list_plan_items).post(elements::create_plan_item),
        )
}
