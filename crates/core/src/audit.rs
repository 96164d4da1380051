//! Audit action vocabulary and entry construction.
//!
//! Every mutating operation builds exactly one [`AuditDraft`] and hands it to
//! the audit repository inside the same transaction as the mutation. Status
//! and GUID changes record only the changed fields; creation and deletion
//! record a full snapshot.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Entity types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Element,
    Checkpoint,
    CheckpointGroup,
    CalibrationPoint,
    PlanItem,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Element => "element",
            Self::Checkpoint => "checkpoint",
            Self::CheckpointGroup => "checkpoint_group",
            Self::CalibrationPoint => "calibration_point",
            Self::PlanItem => "plan_item",
        }
    }

    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "element" => Ok(Self::Element),
            "checkpoint" => Ok(Self::Checkpoint),
            "checkpoint_group" => Ok(Self::CheckpointGroup),
            "calibration_point" => Ok(Self::CalibrationPoint),
            "plan_item" => Ok(Self::PlanItem),
            other => Err(CoreError::Validation(format!(
                "Unknown entity type '{other}'. Must be one of: element, checkpoint, checkpoint_group, calibration_point, plan_item"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    StatusChanged,
    GuidChanged,
    Approved,
    Rejected,
    Returned,
    Locked,
    Unlocked,
    PhotoAdded,
    CommentAdded,
    Assigned,
}

/// All action strings, in declaration order.
pub const ALL_ACTIONS: &[AuditAction] = &[
    AuditAction::Create,
    AuditAction::Update,
    AuditAction::Delete,
    AuditAction::StatusChanged,
    AuditAction::GuidChanged,
    AuditAction::Approved,
    AuditAction::Rejected,
    AuditAction::Returned,
    AuditAction::Locked,
    AuditAction::Unlocked,
    AuditAction::PhotoAdded,
    AuditAction::CommentAdded,
    AuditAction::Assigned,
];

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::StatusChanged => "status_changed",
            Self::GuidChanged => "guid_changed",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Returned => "returned",
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
            Self::PhotoAdded => "photo_added",
            Self::CommentAdded => "comment_added",
            Self::Assigned => "assigned",
        }
    }

    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        ALL_ACTIONS
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown audit action '{s}'")))
    }

    /// Whether `old_values`/`new_values` hold a full snapshot.
    pub fn is_full_snapshot(&self) -> bool {
        matches!(self, Self::Create | Self::Delete)
    }
}

// ---------------------------------------------------------------------------
// Draft entries
// ---------------------------------------------------------------------------

/// An audit entry ready to be appended.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditDraft {
    pub project_id: DbId,
    pub entity_type: EntityType,
    pub entity_id: DbId,
    pub action: AuditAction,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub actor: String,
    pub bulk_action_id: Option<Uuid>,
}

impl AuditDraft {
    /// Creation: full snapshot in `new_values`.
    pub fn created(
        project_id: DbId,
        entity_type: EntityType,
        entity_id: DbId,
        snapshot: Value,
        actor: &str,
    ) -> Self {
        Self {
            project_id,
            entity_type,
            entity_id,
            action: AuditAction::Create,
            old_values: None,
            new_values: Some(snapshot),
            actor: actor.to_string(),
            bulk_action_id: None,
        }
    }

    /// Deletion: full snapshot in `old_values`.
    pub fn deleted(
        project_id: DbId,
        entity_type: EntityType,
        entity_id: DbId,
        snapshot: Value,
        actor: &str,
    ) -> Self {
        Self {
            project_id,
            entity_type,
            entity_id,
            action: AuditAction::Delete,
            old_values: Some(snapshot),
            new_values: None,
            actor: actor.to_string(),
            bulk_action_id: None,
        }
    }

    /// Field-scoped change computed from before/after snapshots.
    pub fn changed(
        project_id: DbId,
        entity_type: EntityType,
        entity_id: DbId,
        action: AuditAction,
        before: &Value,
        after: &Value,
        actor: &str,
    ) -> Self {
        let (old_values, new_values) = changed_fields(before, after);
        Self {
            project_id,
            entity_type,
            entity_id,
            action,
            old_values: Some(old_values),
            new_values: Some(new_values),
            actor: actor.to_string(),
            bulk_action_id: None,
        }
    }

    /// Something was attached to the entity (a photo, a comment, a
    /// measurement). Only `new_values` is set.
    pub fn appended(
        project_id: DbId,
        entity_type: EntityType,
        entity_id: DbId,
        action: AuditAction,
        details: Value,
        actor: &str,
    ) -> Self {
        Self {
            project_id,
            entity_type,
            entity_id,
            action,
            old_values: None,
            new_values: Some(details),
            actor: actor.to_string(),
            bulk_action_id: None,
        }
    }

    pub fn in_bulk(mut self, bulk_action_id: Option<Uuid>) -> Self {
        self.bulk_action_id = bulk_action_id;
        self
    }
}

/// Return `(old, new)` objects containing only the top-level keys whose
/// values differ between `before` and `after`.
pub fn changed_fields(before: &Value, after: &Value) -> (Value, Value) {
    let empty = Map::new();
    let b = before.as_object().unwrap_or(&empty);
    let a = after.as_object().unwrap_or(&empty);

    let mut old = Map::new();
    let mut new = Map::new();
    for (key, after_val) in a {
        let before_val = b.get(key).unwrap_or(&Value::Null);
        if before_val != after_val {
            old.insert(key.clone(), before_val.clone());
            new.insert(key.clone(), after_val.clone());
        }
    }
    for (key, before_val) in b {
        if !a.contains_key(key) {
            old.insert(key.clone(), before_val.clone());
            new.insert(key.clone(), Value::Null);
        }
    }
    (Value::Object(old), Value::Object(new))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
