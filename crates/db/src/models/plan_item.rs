//! Installation / delivery plan items. Elements are referenced by GUID value.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::FromRow;
use sitecheck_core::types::{DbId, Timestamp};

pub const KIND_DELIVERY: &str = "delivery";
pub const KIND_INSTALLATION: &str = "installation";

/// All valid plan item kinds.
pub const VALID_KINDS: &[&str] = &[KIND_DELIVERY, KIND_INSTALLATION];

/// A row from the `plan_items` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PlanItem {
    pub id: DbId,
    pub project_id: DbId,
    pub element_guid: String,
    pub kind: String,
    pub planned_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PlanItem {
    /// Audited fields.
    pub fn snapshot(&self) -> serde_json::Value {
        json!({
            "element_guid": self.element_guid,
            "kind": self.kind,
            "planned_date": self.planned_date,
            "notes": self.notes,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePlanItem {
    pub element_guid: String,
    pub kind: String,
    pub planned_date: Option<NaiveDate>,
    pub notes: Option<String>,
}
