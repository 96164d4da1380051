//! Repository for the `upload_queue` table.

use sqlx::{PgExecutor, PgPool};
use sitecheck_core::types::{DbId, Timestamp};
use sitecheck_core::upload_queue::UploadStatus;
use sitecheck_core::workflow::Actor;

use crate::models::upload_queue::{CreateUploadQueueItem, StaleRelease, UploadQueueItem};

const COLUMNS: &str = "\
    id, project_id, element_guid, payload, status, attempts, next_attempt_at, \
    last_error, last_error_code, submitted_by, submitted_role, client_ref, \
    completed_at, created_at, updated_at";

pub struct UploadQueueRepo;

impl UploadQueueRepo {
    /// Enqueue an offline write. Re-submitting the same `client_ref` for a
    /// project returns the existing item instead of queuing a duplicate.
    pub async fn enqueue(
        pool: &PgPool,
        project_id: DbId,
        input: &CreateUploadQueueItem,
        submitted_by: &Actor,
    ) -> Result<UploadQueueItem, sqlx::Error> {
        let payload = serde_json::to_value(&input.payload)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

        let insert = format!(
            "INSERT INTO upload_queue \
                (project_id, element_guid, payload, submitted_by, submitted_role, client_ref) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT ON CONSTRAINT uq_upload_queue_client_ref DO NOTHING \
             RETURNING {COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, UploadQueueItem>(&insert)
            .bind(project_id)
            .bind(&input.element_guid)
            .bind(&payload)
            .bind(&submitted_by.name)
            .bind(submitted_by.role.as_str())
            .bind(&input.client_ref)
            .fetch_optional(pool)
            .await?;

        match inserted {
            Some(item) => Ok(item),
            None => {
                let query = format!(
                    "SELECT {COLUMNS} FROM upload_queue WHERE project_id = $1 AND client_ref = $2"
                );
                sqlx::query_as::<_, UploadQueueItem>(&query)
                    .bind(project_id)
                    .bind(&input.client_ref)
                    .fetch_one(pool)
                    .await
            }
        }
    }

    pub async fn find_by_id<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<UploadQueueItem>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM upload_queue WHERE id = $1");
        sqlx::query_as::<_, UploadQueueItem>(&query)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Items for a project, optionally filtered by status, oldest first.
    pub async fn list<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        status: Option<UploadStatus>,
    ) -> Result<Vec<UploadQueueItem>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM upload_queue \
             WHERE project_id = $1 AND ($2::TEXT IS NULL OR status = $2) \
             ORDER BY id"
        );
        sqlx::query_as::<_, UploadQueueItem>(&query)
            .bind(project_id)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(db)
            .await
    }

    /// Atomically claim up to `limit` due items and count the attempt.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent workers never
    /// claim the same item.
    pub async fn claim_due(pool: &PgPool, limit: i64) -> Result<Vec<UploadQueueItem>, sqlx::Error> {
        let query = format!(
            "UPDATE upload_queue \
             SET status = 'processing', attempts = attempts + 1 \
             WHERE id IN ( \
                 SELECT id FROM upload_queue \
                 WHERE status = 'pending' AND next_attempt_at <= NOW() \
                 ORDER BY next_attempt_at, id \
                 LIMIT $1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        let mut items = sqlx::query_as::<_, UploadQueueItem>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await?;
        items.sort_by_key(|i| (i.next_attempt_at, i.id));
        Ok(items)
    }

    /// Complete the claim taken at `attempts`. Returns `false` if the claim
    /// was lost (released as stale and claimed again), in which case the
    /// caller must roll back whatever it wrote under the claim.
    pub async fn mark_completed<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
        attempts: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE upload_queue \
             SET status = 'completed', completed_at = NOW(), last_error = NULL, last_error_code = NULL \
             WHERE id = $1 AND status = 'processing' AND attempts = $2",
        )
        .bind(id)
        .bind(attempts)
        .execute(db)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Put a failed attempt back in line for `next_attempt_at`.
    pub async fn mark_retry<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
        next_attempt_at: Timestamp,
        error: &str,
        code: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE upload_queue \
             SET status = 'pending', next_attempt_at = $2, last_error = $3, last_error_code = $4 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(next_attempt_at)
        .bind(error)
        .bind(code)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Terminal failure. The item stays listed until re-queued.
    pub async fn mark_failed<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
        error: &str,
        code: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE upload_queue SET status = 'failed', last_error = $2, last_error_code = $3 \
             WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .bind(code)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Manually re-queue a failed item with a fresh attempt budget.
    /// Returns `None` unless the item exists in `failed` status.
    pub async fn requeue<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        id: DbId,
    ) -> Result<Option<UploadQueueItem>, sqlx::Error> {
        let query = format!(
            "UPDATE upload_queue \
             SET status = 'pending', attempts = 0, next_attempt_at = NOW() \
             WHERE id = $1 AND project_id = $2 AND status = 'failed' \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UploadQueueItem>(&query)
            .bind(id)
            .bind(project_id)
            .fetch_optional(db)
            .await
    }

    /// Settle items stuck in `processing` since before `older_than` (e.g.
    /// after a worker crash). Items with attempts left go back to `pending`;
    /// items that already used `max_attempts` fail.
    pub async fn release_stale<'e>(
        db: impl PgExecutor<'e>,
        older_than: Timestamp,
        max_attempts: i32,
    ) -> Result<StaleRelease, sqlx::Error> {
        let (requeued, failed) = sqlx::query_as::<_, (i64, i64)>(
            "WITH released AS ( \
                 UPDATE upload_queue SET \
                     status = CASE WHEN attempts >= $2 THEN 'failed' ELSE 'pending' END, \
                     last_error = CASE WHEN attempts >= $2 \
                         THEN 'Replay did not finish before the claim went stale' \
                         ELSE last_error END, \
                     last_error_code = CASE WHEN attempts >= $2 THEN 'STALE_CLAIM' \
                         ELSE last_error_code END \
                 WHERE status = 'processing' AND updated_at < $1 \
                 RETURNING status \
             ) \
             SELECT COUNT(*) FILTER (WHERE status = 'pending')::BIGINT, \
                    COUNT(*) FILTER (WHERE status = 'failed')::BIGINT \
             FROM released",
        )
        .bind(older_than)
        .bind(max_attempts)
        .fetch_one(db)
        .await?;
        Ok(StaleRelease {
            requeued: requeued as u64,
            failed: failed as u64,
        })
    }
}
