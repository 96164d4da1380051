//! Element and checkpoint group models.

use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::types::Json;
use sqlx::FromRow;
use sitecheck_core::element::{ElementDescriptors, GuidHistoryEntry, LifecycleStage};
use sitecheck_core::types::{DbId, Timestamp};

/// A row from the `elements` table.
///
/// `id` is the stable key every internal reference uses; `guid` is the
/// current model GUID and may change through a remap.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Element {
    pub id: DbId,
    pub project_id: DbId,
    pub guid: String,
    pub guid_history: Json<Vec<GuidHistoryEntry>>,
    pub assembly_mark: Option<String>,
    pub product_name: Option<String>,
    pub object_type: Option<String>,
    pub arrived_at: Option<Timestamp>,
    pub arrived_by: Option<String>,
    pub installed_at: Option<Timestamp>,
    pub installed_by: Option<String>,
    pub created_by: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Element {
    pub fn stage(&self) -> LifecycleStage {
        LifecycleStage::of(self.arrived_at, self.installed_at)
    }

    /// Audited fields, used as the audit snapshot and as history state.
    pub fn snapshot(&self) -> serde_json::Value {
        json!({
            "guid": self.guid,
            "assembly_mark": self.assembly_mark,
            "product_name": self.product_name,
            "object_type": self.object_type,
            "arrived_at": self.arrived_at,
            "arrived_by": self.arrived_by,
            "installed_at": self.installed_at,
            "installed_by": self.installed_by,
        })
    }
}

/// DTO for registering an element from the model.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateElement {
    pub guid: String,
    #[serde(flatten)]
    pub descriptors: ElementDescriptors,
}

// ---------------------------------------------------------------------------
// Checkpoint groups
// ---------------------------------------------------------------------------

/// A row from `checkpoint_groups`: element GUIDs inspected as one unit.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CheckpointGroup {
    pub id: DbId,
    pub project_id: DbId,
    pub name: String,
    pub member_guids: Vec<String>,
    pub created_by: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CheckpointGroup {
    pub fn snapshot(&self) -> serde_json::Value {
        json!({ "name": self.name, "member_guids": self.member_guids })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCheckpointGroup {
    pub name: String,
    pub member_guids: Vec<String>,
}
