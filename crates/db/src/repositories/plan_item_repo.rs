//! Repository for the `plan_items` table.

use sqlx::PgExecutor;
use sitecheck_core::types::DbId;

use crate::models::plan_item::{CreatePlanItem, PlanItem};

const COLUMNS: &str =
    "id, project_id, element_guid, kind, planned_date, notes, created_at, updated_at";

pub struct PlanItemRepo;

impl PlanItemRepo {
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        input: &CreatePlanItem,
    ) -> Result<PlanItem, sqlx::Error> {
        let query = format!(
            "INSERT INTO plan_items (project_id, element_guid, kind, planned_date, notes) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PlanItem>(&query)
            .bind(project_id)
            .bind(&input.element_guid)
            .bind(&input.kind)
            .bind(input.planned_date)
            .bind(&input.notes)
            .fetch_one(db)
            .await
    }

    pub async fn list_by_project<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
    ) -> Result<Vec<PlanItem>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM plan_items WHERE project_id = $1 \
             ORDER BY planned_date NULLS LAST, id"
        );
        sqlx::query_as::<_, PlanItem>(&query)
            .bind(project_id)
            .fetch_all(db)
            .await
    }

    pub async fn list_by_guid<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        guid: &str,
    ) -> Result<Vec<PlanItem>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM plan_items WHERE project_id = $1 AND element_guid = $2 ORDER BY id"
        );
        sqlx::query_as::<_, PlanItem>(&query)
            .bind(project_id)
            .bind(guid)
            .fetch_all(db)
            .await
    }

    pub async fn find_by_id<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        id: DbId,
    ) -> Result<Option<PlanItem>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM plan_items WHERE id = $1 AND project_id = $2");
        sqlx::query_as::<_, PlanItem>(&query)
            .bind(id)
            .bind(project_id)
            .fetch_optional(db)
            .await
    }

    /// Plan items scheduled for `guid`, locked for update.
    pub async fn lock_by_guid<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        guid: &str,
    ) -> Result<Vec<PlanItem>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM plan_items WHERE project_id = $1 AND element_guid = $2 \
             ORDER BY id FOR UPDATE"
        );
        sqlx::query_as::<_, PlanItem>(&query)
            .bind(project_id)
            .bind(guid)
            .fetch_all(db)
            .await
    }
}
