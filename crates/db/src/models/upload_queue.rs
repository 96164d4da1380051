//! Offline upload queue item model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sitecheck_core::error::CoreError;
use sitecheck_core::types::{DbId, Timestamp};
use sitecheck_core::upload_queue::{UploadPayload, UploadStatus};
use sitecheck_core::workflow::{Actor, ActorRole};

/// A row from the `upload_queue` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UploadQueueItem {
    pub id: DbId,
    pub project_id: DbId,
    pub element_guid: Option<String>,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub next_attempt_at: Timestamp,
    pub last_error: Option<String>,
    pub last_error_code: Option<String>,
    pub submitted_by: String,
    pub submitted_role: String,
    pub client_ref: Option<String>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl UploadQueueItem {
    pub fn status(&self) -> Result<UploadStatus, CoreError> {
        UploadStatus::from_str_db(&self.status)
    }

    pub fn payload(&self) -> Result<UploadPayload, CoreError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            CoreError::Validation(format!("Upload {} has a malformed payload: {e}", self.id))
        })
    }

    /// The user the replayed operation is attributed to.
    pub fn actor(&self) -> Result<Actor, CoreError> {
        Ok(Actor::new(
            self.submitted_by.clone(),
            ActorRole::from_str_db(&self.submitted_role)?,
        ))
    }
}

/// DTO for enqueuing an offline write.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUploadQueueItem {
    pub element_guid: Option<String>,
    pub payload: UploadPayload,
    pub client_ref: Option<String>,
}

/// Outcome of settling stale `processing` claims.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StaleRelease {
    pub requeued: u64,
    pub failed: u64,
}
