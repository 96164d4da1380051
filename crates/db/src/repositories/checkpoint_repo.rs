//! Repositories for `checkpoints` and `inspection_results`.

use sqlx::PgExecutor;
use sitecheck_core::types::DbId;
use sitecheck_core::workflow::CheckpointState;

use crate::models::checkpoint::{
    Checkpoint, CreateCheckpoint, CreateInspectionResult, InspectionResult,
};

const COLUMNS: &str = "\
    id, project_id, element_id, group_id, name, status, can_edit, \
    started_at, started_by, completed_at, completed_by, reviewed_at, reviewed_by, \
    review_comment, locked_at, locked_by, unlocked_at, unlocked_by, assigned_to, \
    created_at, updated_at";

const RESULT_COLUMNS: &str = "\
    id, project_id, checkpoint_id, element_guid, kind, value_numeric, value_text, \
    photo_url, recorded_by, recorded_at, created_at, updated_at";

// ---------------------------------------------------------------------------
// CheckpointRepo
// ---------------------------------------------------------------------------

pub struct CheckpointRepo;

impl CheckpointRepo {
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        input: &CreateCheckpoint,
    ) -> Result<Checkpoint, sqlx::Error> {
        let query = format!(
            "INSERT INTO checkpoints (project_id, element_id, group_id, name, assigned_to) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Checkpoint>(&query)
            .bind(project_id)
            .bind(input.element_id)
            .bind(input.group_id)
            .bind(&input.name)
            .bind(&input.assigned_to)
            .fetch_one(db)
            .await
    }

    pub async fn find_by_id<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<Checkpoint>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM checkpoints WHERE id = $1");
        sqlx::query_as::<_, Checkpoint>(&query)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Lock a checkpoint row (`FOR UPDATE`).
    pub async fn lock_by_id<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
    ) -> Result<Option<Checkpoint>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM checkpoints WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Checkpoint>(&query)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn list_by_element<'e>(
        db: impl PgExecutor<'e>,
        element_id: DbId,
    ) -> Result<Vec<Checkpoint>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM checkpoints WHERE element_id = $1 ORDER BY id");
        sqlx::query_as::<_, Checkpoint>(&query)
            .bind(element_id)
            .fetch_all(db)
            .await
    }

    /// Project checkpoints, optionally filtered by status.
    pub async fn list_by_project<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        status: Option<&str>,
    ) -> Result<Vec<Checkpoint>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM checkpoints \
             WHERE project_id = $1 AND ($2::TEXT IS NULL OR status = $2) \
             ORDER BY id"
        );
        sqlx::query_as::<_, Checkpoint>(&query)
            .bind(project_id)
            .bind(status)
            .fetch_all(db)
            .await
    }

    /// Persist every workflow field of `state`.
    pub async fn apply_state<'e>(
        db: impl PgExecutor<'e>,
        id: DbId,
        state: &CheckpointState,
    ) -> Result<Checkpoint, sqlx::Error> {
        let query = format!(
            "UPDATE checkpoints SET \
                status = $2, can_edit = $3, \
                started_at = $4, started_by = $5, \
                completed_at = $6, completed_by = $7, \
                reviewed_at = $8, reviewed_by = $9, review_comment = $10, \
                locked_at = $11, locked_by = $12, \
                unlocked_at = $13, unlocked_by = $14, \
                assigned_to = $15 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Checkpoint>(&query)
            .bind(id)
            .bind(state.status.as_str())
            .bind(state.can_edit)
            .bind(state.started_at)
            .bind(&state.started_by)
            .bind(state.completed_at)
            .bind(&state.completed_by)
            .bind(state.reviewed_at)
            .bind(&state.reviewed_by)
            .bind(&state.review_comment)
            .bind(state.locked_at)
            .bind(&state.locked_by)
            .bind(state.unlocked_at)
            .bind(&state.unlocked_by)
            .bind(&state.assigned_to)
            .fetch_one(db)
            .await
    }
}

// ---------------------------------------------------------------------------
// InspectionResultRepo
// ---------------------------------------------------------------------------

pub struct InspectionResultRepo;

impl InspectionResultRepo {
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        input: &CreateInspectionResult,
    ) -> Result<InspectionResult, sqlx::Error> {
        let query = format!(
            "INSERT INTO inspection_results \
                (project_id, checkpoint_id, element_guid, kind, value_numeric, value_text, \
                 photo_url, recorded_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {RESULT_COLUMNS}"
        );
        sqlx::query_as::<_, InspectionResult>(&query)
            .bind(input.project_id)
            .bind(input.checkpoint_id)
            .bind(&input.element_guid)
            .bind(input.kind.as_str())
            .bind(input.value_numeric)
            .bind(&input.value_text)
            .bind(&input.photo_url)
            .bind(&input.recorded_by)
            .fetch_one(db)
            .await
    }

    pub async fn list_by_checkpoint<'e>(
        db: impl PgExecutor<'e>,
        checkpoint_id: DbId,
    ) -> Result<Vec<InspectionResult>, sqlx::Error> {
        let query = format!(
            "SELECT {RESULT_COLUMNS} FROM inspection_results WHERE checkpoint_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, InspectionResult>(&query)
            .bind(checkpoint_id)
            .fetch_all(db)
            .await
    }

    pub async fn list_by_guid<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        guid: &str,
    ) -> Result<Vec<InspectionResult>, sqlx::Error> {
        let query = format!(
            "SELECT {RESULT_COLUMNS} FROM inspection_results \
             WHERE project_id = $1 AND element_guid = $2 ORDER BY id"
        );
        sqlx::query_as::<_, InspectionResult>(&query)
            .bind(project_id)
            .bind(guid)
            .fetch_all(db)
            .await
    }
}
