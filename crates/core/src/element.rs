//! Element identity: GUID rules, GUID dependents, lifecycle projection.
//!
//! An element's stable `id` never changes. Its model GUID is a mutable,
//! uniquely indexed attribute; records elsewhere that hold the GUID by value
//! are listed in [`GUID_DEPENDENTS`] and rewritten together on remap.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

/// Maximum GUID length accepted from the model viewer.
pub const MAX_GUID_LENGTH: usize = 64;

/// Maximum length of an element descriptor (assembly mark, product, type).
pub const MAX_DESCRIPTOR_LENGTH: usize = 255;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a model GUID. IFC GUIDs are 22 characters, but any non-blank
/// token without whitespace is accepted.
pub fn validate_guid(guid: &str) -> Result<(), CoreError> {
    if guid.is_empty() {
        return Err(CoreError::Validation("GUID must not be empty".to_string()));
    }
    if guid.len() > MAX_GUID_LENGTH {
        return Err(CoreError::Validation(format!(
            "GUID exceeds maximum length of {MAX_GUID_LENGTH} characters (got {})",
            guid.len()
        )));
    }
    if guid.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(CoreError::Validation(format!(
            "GUID '{guid}' must not contain whitespace or control characters"
        )));
    }
    Ok(())
}

/// Validate a remap request before touching storage.
pub fn validate_remap(old_guid: &str, new_guid: &str) -> Result<(), CoreError> {
    validate_guid(old_guid)?;
    validate_guid(new_guid)?;
    if old_guid == new_guid {
        return Err(CoreError::Validation(format!(
            "Cannot remap GUID '{old_guid}' to itself"
        )));
    }
    Ok(())
}

/// Descriptive attributes copied from the model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementDescriptors {
    pub assembly_mark: Option<String>,
    pub product_name: Option<String>,
    pub object_type: Option<String>,
}

impl ElementDescriptors {
    pub fn validate(&self) -> Result<(), CoreError> {
        for (name, value) in [
            ("assembly_mark", &self.assembly_mark),
            ("product_name", &self.product_name),
            ("object_type", &self.object_type),
        ] {
            if value.as_ref().is_some_and(|v| v.len() > MAX_DESCRIPTOR_LENGTH) {
                return Err(CoreError::Validation(format!(
                    "{name} exceeds maximum length of {MAX_DESCRIPTOR_LENGTH} characters"
                )));
            }
        }
        Ok(())
    }
}

/// One prior GUID of an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidHistoryEntry {
    pub old_guid: String,
    pub changed_at: Timestamp,
    pub changed_by: String,
}

/// Validate a checkpoint group definition and return its members with
/// duplicates removed, first occurrence kept.
pub fn normalize_group_members(name: &str, members: &[String]) -> Result<Vec<String>, CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation("Group name must not be empty".to_string()));
    }
    if members.is_empty() {
        return Err(CoreError::Validation(
            "A checkpoint group needs at least one member".to_string(),
        ));
    }
    let mut out: Vec<String> = Vec::with_capacity(members.len());
    for guid in members {
        validate_guid(guid)?;
        if !out.contains(guid) {
            out.push(guid.clone());
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// GUID dependents
// ---------------------------------------------------------------------------

/// How a dependent column stores the GUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependentKind {
    /// A single `TEXT` column.
    Scalar,
    /// A `TEXT[]` column; every matching element is replaced.
    Array,
}

/// A table column that stores element GUIDs by value. Every dependent table
/// carries a `project_id` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuidDependent {
    pub table: &'static str,
    pub column: &'static str,
    pub kind: DependentKind,
}

impl GuidDependent {
    pub const fn scalar(table: &'static str, column: &'static str) -> Self {
        Self {
            table,
            column,
            kind: DependentKind::Scalar,
        }
    }

    pub const fn array(table: &'static str, column: &'static str) -> Self {
        Self {
            table,
            column,
            kind: DependentKind::Array,
        }
    }

    /// Rewrite statement. Binds: `$1` project id, `$2` old GUID, `$3` new GUID.
    pub fn rewrite_sql(&self) -> String {
        let (table, col) = (self.table, self.column);
        match self.kind {
            DependentKind::Scalar => format!(
                "UPDATE {table} SET {col} = $3 WHERE project_id = $1 AND {col} = $2"
            ),
            DependentKind::Array => format!(
                "UPDATE {table} SET {col} = array_replace({col}, $2, $3) \
                 WHERE project_id = $1 AND $2 = ANY({col})"
            ),
        }
    }
}

/// Every column that holds an element GUID by value. A remap rewrites all
/// of them in the same transaction as the element row.
pub const GUID_DEPENDENTS: &[GuidDependent] = &[
    GuidDependent::scalar("inspection_results", "element_guid"),
    GuidDependent::array("checkpoint_groups", "member_guids"),
    GuidDependent::scalar("plan_items", "element_guid"),
    GuidDependent::scalar("upload_queue", "element_guid"),
];

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    Planned,
    Arrived,
    Installed,
}

impl LifecycleStage {
    pub fn of(arrived_at: Option<Timestamp>, installed_at: Option<Timestamp>) -> Self {
        match (arrived_at, installed_at) {
            (_, Some(_)) => Self::Installed,
            (Some(_), None) => Self::Arrived,
            (None, None) => Self::Planned,
        }
    }
}

/// Read projection of a project's element progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementLifecycleStats {
    pub total: i64,
    pub arrived: i64,
    pub installed: i64,
    pub inspected: i64,
    pub approved: i64,
    pub rejected: i64,
}

impl ElementLifecycleStats {
    /// Share of elements installed, 0.0 when the project has none.
    pub fn installed_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.installed as f64 / self.total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    #[test]
    fn ifc_guid_is_valid() {
        assert!(validate_guid("2O2Fr$t4X7Zf8NOew3FLOH").is_ok());
    }

    #[test]
    fn blank_or_spaced_guids_are_rejected() {
        assert!(validate_guid("").is_err());
        assert!(validate_guid("abc def").is_err());
        assert!(validate_guid(&"x".repeat(MAX_GUID_LENGTH + 1)).is_err());
    }

    #[test]
    fn remap_to_same_guid_is_rejected() {
        assert_matches!(validate_remap("A", "A"), Err(CoreError::Validation(_)));
        assert!(validate_remap("A", "B").is_ok());
    }

    #[test]
    fn group_members_are_deduplicated_in_order() {
        let members = vec!["B".to_string(), "A".to_string(), "B".to_string()];
        assert_eq!(normalize_group_members("Stair 1", &members).unwrap(), vec!["B", "A"]);
        assert!(normalize_group_members("Stair 1", &[]).is_err());
        assert!(normalize_group_members(" ", &members).is_err());
    }

    #[test]
    fn dependents_cover_every_guid_column() {
        let tables: Vec<_> = GUID_DEPENDENTS.iter().map(|d| d.table).collect();
        assert_eq!(
            tables,
            ["inspection_results", "checkpoint_groups", "plan_items", "upload_queue"]
        );
    }

    #[test]
    fn array_dependent_uses_array_replace() {
        let sql = GuidDependent::array("checkpoint_groups", "member_guids").rewrite_sql();
        assert!(sql.contains("array_replace(member_guids, $2, $3)"));
        assert!(sql.contains("$2 = ANY(member_guids)"));
    }

    #[test]
    fn lifecycle_stage_prefers_installation() {
        let now = Some(Utc::now());
        assert_eq!(LifecycleStage::of(None, None), LifecycleStage::Planned);
        assert_eq!(LifecycleStage::of(now, None), LifecycleStage::Arrived);
        assert_eq!(LifecycleStage::of(now, now), LifecycleStage::Installed);
    }

    #[test]
    fn installed_ratio_handles_empty_project() {
        assert_eq!(ElementLifecycleStats::default().installed_ratio(), 0.0);
        let stats = ElementLifecycleStats {
            total: 4,
            installed: 1,
            ..Default::default()
        };
        assert_eq!(stats.installed_ratio(), 0.25);
    }
}
