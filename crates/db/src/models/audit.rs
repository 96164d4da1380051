//! Audit log entry model and query parameters.
//!
//! Audit rows have no `updated_at` field (immutable records).

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sitecheck_core::audit::AuditAction;
use sitecheck_core::error::CoreError;
use sitecheck_core::history::HistoryEvent;
use sitecheck_core::types::{DbId, Timestamp};
use uuid::Uuid;

/// A single audit log entry. Immutable once created.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditLogEntry {
    pub id: DbId,
    pub project_id: DbId,
    pub entity_type: String,
    pub entity_id: DbId,
    pub action: String,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub actor: String,
    pub bulk_action_id: Option<Uuid>,
    pub created_at: Timestamp,
}

impl AuditLogEntry {
    pub fn to_history_event(&self) -> Result<HistoryEvent, CoreError> {
        Ok(HistoryEvent {
            id: self.id,
            action: AuditAction::from_str_db(&self.action)?,
            old_values: self.old_values.clone(),
            new_values: self.new_values.clone(),
            actor: self.actor.clone(),
            created_at: self.created_at,
            bulk_action_id: self.bulk_action_id,
        })
    }
}

/// Filter parameters for reporting queries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    pub entity_type: Option<String>,
    pub entity_id: Option<DbId>,
    pub action: Option<String>,
    pub actor: Option<String>,
    pub bulk_action_id: Option<Uuid>,
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
