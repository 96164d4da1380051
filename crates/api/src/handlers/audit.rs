//! Handler for audit log reporting.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use sitecheck_core::audit::{AuditAction, EntityType};
use sitecheck_core::types::DbId;
use sitecheck_db::models::audit::AuditQuery;
use sitecheck_db::repositories::AuditLogRepo;

use crate::error::AppResult;
use crate::response::PagedResponse;
use crate::state::AppState;

/// GET /api/v1/projects/{project_id}/audit
///
/// Filters: `entity_type`, `entity_id`, `action`, `actor`,
/// `bulk_action_id`, `from`, `to`. Newest first, paged by
/// `limit`/`offset`; `total` counts every matching entry.
pub async fn query_audit(
    State(state): State<AppState>,
    Path(project_id): Path<DbId>,
    Query(params): Query<AuditQuery>,
) -> AppResult<impl IntoResponse> {
    if let Some(entity_type) = params.entity_type.as_deref() {
        EntityType::from_str_db(entity_type)?;
    }
    if let Some(action) = params.action.as_deref() {
        AuditAction::from_str_db(action)?;
    }

    let (entries, total) = tokio::try_join!(
        AuditLogRepo::query(&state.pool, project_id, &params),
        AuditLogRepo::count(&state.pool, project_id, &params),
    )?;
    Ok(Json(PagedResponse {
        data: entries,
        total,
    }))
}
