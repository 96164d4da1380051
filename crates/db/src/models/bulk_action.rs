//! Bulk action log model: one row per bulk call.

use serde::Serialize;
use sqlx::FromRow;
use sitecheck_core::types::{DbId, Timestamp};
use uuid::Uuid;

/// A row from `bulk_action_logs`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BulkActionLog {
    pub id: DbId,
    pub bulk_action_id: Uuid,
    pub project_id: DbId,
    pub action: String,
    pub target_ids: Vec<DbId>,
    pub params: serde_json::Value,
    pub success_count: i32,
    pub failure_count: i32,
    pub results: serde_json::Value,
    pub actor: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct CreateBulkActionLog {
    pub bulk_action_id: Uuid,
    pub project_id: DbId,
    pub action: String,
    pub target_ids: Vec<DbId>,
    pub params: serde_json::Value,
    pub success_count: i32,
    pub failure_count: i32,
    pub results: serde_json::Value,
    pub actor: String,
}
