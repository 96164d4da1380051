//! Repository for the `bulk_action_logs` table.

use sqlx::PgExecutor;
use sitecheck_core::types::DbId;
use uuid::Uuid;

use crate::models::bulk_action::{BulkActionLog, CreateBulkActionLog};

const COLUMNS: &str = "\
    id, bulk_action_id, project_id, action, target_ids, params, success_count, \
    failure_count, results, actor, created_at, updated_at";

pub struct BulkActionLogRepo;

impl BulkActionLogRepo {
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        input: &CreateBulkActionLog,
    ) -> Result<BulkActionLog, sqlx::Error> {
        let query = format!(
            "INSERT INTO bulk_action_logs \
                (bulk_action_id, project_id, action, target_ids, params, success_count, \
                 failure_count, results, actor) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BulkActionLog>(&query)
            .bind(input.bulk_action_id)
            .bind(input.project_id)
            .bind(&input.action)
            .bind(&input.target_ids)
            .bind(&input.params)
            .bind(input.success_count)
            .bind(input.failure_count)
            .bind(&input.results)
            .bind(&input.actor)
            .fetch_one(db)
            .await
    }

    pub async fn find_by_bulk_action_id<'e>(
        db: impl PgExecutor<'e>,
        bulk_action_id: Uuid,
    ) -> Result<Option<BulkActionLog>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM bulk_action_logs WHERE bulk_action_id = $1");
        sqlx::query_as::<_, BulkActionLog>(&query)
            .bind(bulk_action_id)
            .fetch_optional(db)
            .await
    }

    /// Most recent bulk calls for a project.
    pub async fn list_by_project<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        limit: i64,
    ) -> Result<Vec<BulkActionLog>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM bulk_action_logs WHERE project_id = $1 \
             ORDER BY id DESC LIMIT $2"
        );
        sqlx::query_as::<_, BulkActionLog>(&query)
            .bind(project_id)
            .bind(limit)
            .fetch_all(db)
            .await
    }
}
