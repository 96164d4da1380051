//! Route definitions for checkpoints, bulk review, the audit log and the
//! offline upload queue.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{audit, bulk, checkpoints, uploads};
use crate::state::AppState;

/// Routes scoped under `/projects/{project_id}`.
///
/// ```text
/// GET    /checkpoints                               -> list_checkpoints
/// POST   /checkpoints                               -> create_checkpoint
/// GET    /checkpoints/{checkpoint_id}               -> get_checkpoint
/// POST   /checkpoints/{checkpoint_id}/transitions   -> transition
/// GET    /checkpoints/{checkpoint_id}/results       -> list_results
/// POST   /checkpoints/{checkpoint_id}/results       -> record_result
/// GET    /checkpoints/{checkpoint_id}/history       -> checkpoint_history
///
/// POST   /bulk                                      -> apply_bulk
/// GET    /bulk                                      -> list_bulk_logs
/// GET    /bulk/{bulk_action_id}                     -> get_bulk_log
///
/// GET    /audit                                     -> query_audit
///
/// GET    /uploads                                   -> list_uploads
/// POST   /uploads                                   -> submit_upload
/// POST   /uploads/{upload_id}/requeue               -> requeue_upload
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/projects/{project_id}/checkpoints",
            get(checkpoints::list_checkpoints).post(checkpoints::create_checkpoint),
        )
        .route(
            "/projects/{project_id}/checkpoints/{checkpoint_id}",
            get(checkpoints::get_checkpoint),
        )
        .route(
            "/projects/{project_id}/checkpoints/{checkpoint_id}/transitions",
            post(checkpoints::transition),
        )
        .route(
            "/projects/{project_id}/checkpoints/{checkpoint_id}/results",
            get(checkpoints::list_results).post(checkpoints::record_result),
        )
        .route(
            "/projects/{project_id}/checkpoints/{checkpoint_id}/history",
            get(checkpoints::checkpoint_history),
        )
        .route(
            "/projects/{project_id}/bulk",
            get(bulk::list_bulk_logs).post(bulk::apply_bulk),
        )
        .route(
            "/projects/{project_id}/bulk/{bulk_action_id}",
            get(bulk::get_bulk_log),
        )
        .route("/projects/{project_id}/audit", get(audit::query_audit))
        .route(
            "/projects/{project_id}/uploads",
            get(uploads::list_uploads).post(uploads::submit_upload),
        )
        .route(
            "/projects/{project_id}/uploads/{upload_id}/requeue",
            post(uploads::requeue_upload),
        )
}
