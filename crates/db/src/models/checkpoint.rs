//! Inspection checkpoint and result models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sitecheck_core::error::CoreError;
use sitecheck_core::types::{DbId, Timestamp};
use sitecheck_core::upload_queue::ResultKind;
use sitecheck_core::workflow::{status_color, CheckpointState, InspectionStatus};

/// A row from the `checkpoints` table.
///
/// Targets exactly one of `element_id` (stable id) or `group_id`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Checkpoint {
    pub id: DbId,
    pub project_id: DbId,
    pub element_id: Option<DbId>,
    pub group_id: Option<DbId>,
    pub name: String,
    pub status: String,
    pub can_edit: bool,
    pub started_at: Option<Timestamp>,
    pub started_by: Option<String>,
    pub completed_at: Option<Timestamp>,
    pub completed_by: Option<String>,
    pub reviewed_at: Option<Timestamp>,
    pub reviewed_by: Option<String>,
    pub review_comment: Option<String>,
    pub locked_at: Option<Timestamp>,
    pub locked_by: Option<String>,
    pub unlocked_at: Option<Timestamp>,
    pub unlocked_by: Option<String>,
    pub assigned_to: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Checkpoint {
    pub fn status(&self) -> Result<InspectionStatus, CoreError> {
        InspectionStatus::from_str_db(&self.status)
    }

    /// Viewer color for the current status; grey for an unknown status.
    pub fn color(&self) -> &'static str {
        status_color(self.status().unwrap_or(InspectionStatus::NotStarted))
    }

    /// Workflow fields as the pure state-machine type.
    pub fn state(&self) -> Result<CheckpointState, CoreError> {
        Ok(CheckpointState {
            status: self.status()?,
            can_edit: self.can_edit,
            started_at: self.started_at,
            started_by: self.started_by.clone(),
            completed_at: self.completed_at,
            completed_by: self.completed_by.clone(),
            reviewed_at: self.reviewed_at,
            reviewed_by: self.reviewed_by.clone(),
            review_comment: self.review_comment.clone(),
            locked_at: self.locked_at,
            locked_by: self.locked_by.clone(),
            unlocked_at: self.unlocked_at,
            unlocked_by: self.unlocked_by.clone(),
            assigned_to: self.assigned_to.clone(),
        })
    }
}

/// DTO for creating a checkpoint on an element or a group.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCheckpoint {
    pub element_id: Option<DbId>,
    pub group_id: Option<DbId>,
    pub name: String,
    pub assigned_to: Option<String>,
}

// ---------------------------------------------------------------------------
// Inspection results
// ---------------------------------------------------------------------------

/// A row from `inspection_results`. `element_guid` is a by-value copy.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct InspectionResult {
    pub id: DbId,
    pub project_id: DbId,
    pub checkpoint_id: DbId,
    pub element_guid: Option<String>,
    pub kind: String,
    pub value_numeric: Option<f64>,
    pub value_text: Option<String>,
    pub photo_url: Option<String>,
    pub recorded_by: String,
    pub recorded_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct CreateInspectionResult {
    pub project_id: DbId,
    pub checkpoint_id: DbId,
    pub element_guid: Option<String>,
    pub kind: ResultKind,
    pub value_numeric: Option<f64>,
    pub value_text: Option<String>,
    pub photo_url: Option<String>,
    pub recorded_by: String,
}
