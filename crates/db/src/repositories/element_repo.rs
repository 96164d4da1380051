//! Repositories for `elements` and `checkpoint_groups`.

use sqlx::types::Json;
use sqlx::PgExecutor;
use sitecheck_core::element::{ElementLifecycleStats, GuidDependent, GuidHistoryEntry};
use sitecheck_core::types::{DbId, Timestamp};

use crate::models::element::{CheckpointGroup, CreateCheckpointGroup, CreateElement, Element};

const COLUMNS: &str = "\
    id, project_id, guid, guid_history, assembly_mark, product_name, object_type, \
    arrived_at, arrived_by, installed_at, installed_by, created_by, created_at, updated_at";

const GROUP_COLUMNS: &str = "id, project_id, name, member_guids, created_by, created_at, updated_at";

/// Statuses that count as "inspected" for lifecycle stats.
const INSPECTED_STATUSES: &str = "'completed', 'approved', 'rejected', 'returned'";

// ---------------------------------------------------------------------------
// ElementRepo
// ---------------------------------------------------------------------------

pub struct ElementRepo;

impl ElementRepo {
    /// Insert an element. A held `(project_id, guid)` fails with a unique
    /// violation on `uq_elements_project_guid`.
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        input: &CreateElement,
        created_by: &str,
    ) -> Result<Element, sqlx::Error> {
        let query = format!(
            "INSERT INTO elements \
                (project_id, guid, assembly_mark, product_name, object_type, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Element>(&query)
            .bind(project_id)
            .bind(&input.guid)
            .bind(&input.descriptors.assembly_mark)
            .bind(&input.descriptors.product_name)
            .bind(&input.descriptors.object_type)
            .bind(created_by)
            .fetch_one(db)
            .await
    }

    pub async fn find_by_id<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        id: DbId,
    ) -> Result<Option<Element>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM elements WHERE id = $1 AND project_id = $2");
        sqlx::query_as::<_, Element>(&query)
            .bind(id)
            .bind(project_id)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_guid<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        guid: &str,
    ) -> Result<Option<Element>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM elements WHERE project_id = $1 AND guid = $2");
        sqlx::query_as::<_, Element>(&query)
            .bind(project_id)
            .bind(guid)
            .fetch_optional(db)
            .await
    }

    /// Lock an element row by stable id (`FOR UPDATE`).
    pub async fn lock_by_id<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        id: DbId,
    ) -> Result<Option<Element>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM elements WHERE id = $1 AND project_id = $2 FOR UPDATE"
        );
        sqlx::query_as::<_, Element>(&query)
            .bind(id)
            .bind(project_id)
            .fetch_optional(db)
            .await
    }

    /// Lock an element row by current GUID (`FOR UPDATE`).
    pub async fn lock_by_guid<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        guid: &str,
    ) -> Result<Option<Element>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM elements WHERE project_id = $1 AND guid = $2 FOR UPDATE"
        );
        sqlx::query_as::<_, Element>(&query)
            .bind(project_id)
            .bind(guid)
            .fetch_optional(db)
            .await
    }

    /// Lock every element whose current GUID is in `guids`, in id order.
    pub async fn lock_by_guids<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        guids: &[String],
    ) -> Result<Vec<Element>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM elements \
             WHERE project_id = $1 AND guid = ANY($2) \
             ORDER BY id FOR UPDATE"
        );
        sqlx::query_as::<_, Element>(&query)
            .bind(project_id)
            .bind(guids)
            .fetch_all(db)
            .await
    }

    pub async fn list<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Element>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM elements WHERE project_id = $1 \
             ORDER BY id LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, Element>(&query)
            .bind(project_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(db)
            .await
    }

    /// Set a new current GUID and append the previous one to the history.
    pub async fn update_guid<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
        new_guid: &str,
        entry: &GuidHistoryEntry,
    ) -> Result<Element, sqlx::Error> {
        let query = format!(
            "UPDATE elements \
             SET guid = $2, guid_history = guid_history || $3 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Element>(&query)
            .bind(id)
            .bind(new_guid)
            .bind(Json(vec![entry]))
            .fetch_one(db)
            .await
    }

    pub async fn record_arrival<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
        at: Timestamp,
        by: &str,
    ) -> Result<Element, sqlx::Error> {
        let query = format!(
            "UPDATE elements SET arrived_at = $2, arrived_by = $3 WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Element>(&query)
            .bind(id)
            .bind(at)
            .bind(by)
            .fetch_one(db)
            .await
    }

    pub async fn record_installation<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
        at: Timestamp,
        by: &str,
    ) -> Result<Element, sqlx::Error> {
        let query = format!(
            "UPDATE elements SET installed_at = $2, installed_by = $3 WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Element>(&query)
            .bind(id)
            .bind(at)
            .bind(by)
            .fetch_one(db)
            .await
    }

    /// Rewrite one GUID dependent column from `old_guid` to `new_guid`.
    /// Returns the number of rows touched.
    pub async fn rewrite_dependent<'e>(
        db: impl PgExecutor<'e>,
        dependent: &GuidDependent,
        project_id: DbId,
        old_guid: &str,
        new_guid: &str,
    ) -> Result<u64, sqlx::Error> {
        let sql = dependent.rewrite_sql();
        let result = sqlx::query(&sql)
            .bind(project_id)
            .bind(old_guid)
            .bind(new_guid)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }

    /// Element progress counts for one project.
    pub async fn lifecycle_stats<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
    ) -> Result<ElementLifecycleStats, sqlx::Error> {
        let query = format!(
            "SELECT \
                COUNT(*)::BIGINT, \
                COUNT(*) FILTER (WHERE e.arrived_at IS NOT NULL)::BIGINT, \
                COUNT(*) FILTER (WHERE e.installed_at IS NOT NULL)::BIGINT, \
                COUNT(*) FILTER (WHERE EXISTS (SELECT 1 FROM checkpoints c \
                    WHERE c.element_id = e.id AND c.status IN ({INSPECTED_STATUSES})))::BIGINT, \
                COUNT(*) FILTER (WHERE EXISTS (SELECT 1 FROM checkpoints c \
                    WHERE c.element_id = e.id AND c.status = 'approved'))::BIGINT, \
                COUNT(*) FILTER (WHERE EXISTS (SELECT 1 FROM checkpoints c \
                    WHERE c.element_id = e.id AND c.status = 'rejected'))::BIGINT \
             FROM elements e WHERE e.project_id = $1"
        );
        let (total, arrived, installed, inspected, approved, rejected) =
            sqlx::query_as::<_, (i64, i64, i64, i64, i64, i64)>(&query)
                .bind(project_id)
                .fetch_one(db)
                .await?;
        Ok(ElementLifecycleStats {
            total,
            arrived,
            installed,
            inspected,
            approved,
            rejected,
        })
    }
}

// ---------------------------------------------------------------------------
// CheckpointGroupRepo
// ---------------------------------------------------------------------------

pub struct CheckpointGroupRepo;

impl CheckpointGroupRepo {
    /// Insert a group. `member_guids` must already be validated and deduplicated.
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        input: &CreateCheckpointGroup,
        created_by: &str,
    ) -> Result<CheckpointGroup, sqlx::Error> {
        let query = format!(
            "INSERT INTO checkpoint_groups (project_id, name, member_guids, created_by) \
             VALUES ($1, $2, $3, $4) RETURNING {GROUP_COLUMNS}"
        );
        sqlx::query_as::<_, CheckpointGroup>(&query)
            .bind(project_id)
            .bind(&input.name)
            .bind(&input.member_guids)
            .bind(created_by)
            .fetch_one(db)
            .await
    }

    pub async fn find_by_id<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        id: DbId,
    ) -> Result<Option<CheckpointGroup>, sqlx::Error> {
        let query = format!(
            "SELECT {GROUP_COLUMNS} FROM checkpoint_groups WHERE id = $1 AND project_id = $2"
        );
        sqlx::query_as::<_, CheckpointGroup>(&query)
            .bind(id)
            .bind(project_id)
            .fetch_optional(db)
            .await
    }

    pub async fn list_by_project<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
    ) -> Result<Vec<CheckpointGroup>, sqlx::Error> {
        let query = format!(
            "SELECT {GROUP_COLUMNS} FROM checkpoint_groups WHERE project_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, CheckpointGroup>(&query)
            .bind(project_id)
            .fetch_all(db)
            .await
    }

    /// Groups that currently list `guid` as a member.
    pub async fn list_containing<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        guid: &str,
    ) -> Result<Vec<CheckpointGroup>, sqlx::Error> {
        let query = format!(
            "SELECT {GROUP_COLUMNS} FROM checkpoint_groups \
             WHERE project_id = $1 AND $2 = ANY(member_guids) ORDER BY id"
        );
        sqlx::query_as::<_, CheckpointGroup>(&query)
            .bind(project_id)
            .bind(guid)
            .fetch_all(db)
            .await
    }

    /// [`Self::list_containing`] with the rows locked for update.
    pub async fn lock_containing<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        guid: &str,
    ) -> Result<Vec<CheckpointGroup>, sqlx::Error> {
        let query = format!(
            "SELECT {GROUP_COLUMNS} FROM checkpoint_groups \
             WHERE project_id = $1 AND $2 = ANY(member_guids) ORDER BY id FOR UPDATE"
        );
        sqlx::query_as::<_, CheckpointGroup>(&query)
            .bind(project_id)
            .bind(guid)
            .fetch_all(db)
            .await
    }
}
