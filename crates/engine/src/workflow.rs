//! Checkpoint workflow transitions and inspection results.
//!
//! A transition locks the checkpoint row and then the owning element rows
//! (one element, or every member of a group). Remaps lock the same element
//! rows, so a transition never interleaves with a GUID change of its
//! target.

use chrono::Utc;
use serde_json::{json, Value};
use sqlx::{PgConnection, PgPool};
use sitecheck_core::audit::{AuditAction, AuditDraft, EntityType};
use sitecheck_core::error::CoreError;
use sitecheck_core::types::DbId;
use sitecheck_core::upload_queue::{ResultInput, ResultKind};
use sitecheck_core::workflow::{
    auto_start, ensure_result_writable, plan_transition, Actor, InspectionStatus,
    TransitionRequest,
};
use sitecheck_db::models::checkpoint::{
    Checkpoint, CreateCheckpoint, CreateInspectionResult, InspectionResult,
};
use sitecheck_db::repositories::{
    AuditLogRepo, CheckpointGroupRepo, CheckpointRepo, ElementRepo, InspectionResultRepo,
};
use uuid::Uuid;

use crate::error::EngineError;
use crate::history::{begin_snapshot, EntityHistory};

fn checkpoint_not_found(id: DbId) -> EngineError {
    CoreError::not_found("checkpoint", id).into()
}

/// Workflow fields of a checkpoint as stored in audit entries.
fn snapshot(cp: &Checkpoint) -> Result<Value, EngineError> {
    serde_json::to_value(cp.state()?)
        .map_err(|e| CoreError::Internal(format!("checkpoint {} snapshot: {e}", cp.id)).into())
}

/// Lock checkpoint `id` if it belongs to `project_id`.
async fn lock_checkpoint(
    conn: &mut PgConnection,
    project_id: DbId,
    id: DbId,
) -> Result<Checkpoint, EngineError> {
    match CheckpointRepo::lock_by_id(conn, id).await? {
        Some(cp) if cp.project_id == project_id => Ok(cp),
        _ => Err(checkpoint_not_found(id)),
    }
}

/// Lock the element rows a checkpoint inspects. Returns the element GUID
/// for a single-element checkpoint, `None` for a group.
async fn lock_owner(conn: &mut PgConnection, cp: &Checkpoint) -> Result<Option<String>, EngineError> {
    if let Some(element_id) = cp.element_id {
        let element = ElementRepo::lock_by_id(&mut *conn, cp.project_id, element_id)
            .await?
            .ok_or_else(|| CoreError::not_found("element", element_id))?;
        return Ok(Some(element.guid));
    }
    if let Some(group_id) = cp.group_id {
        let group = CheckpointGroupRepo::find_by_id(&mut *conn, cp.project_id, group_id)
            .await?
            .ok_or_else(|| CoreError::not_found("checkpoint_group", group_id))?;
        ElementRepo::lock_by_guids(&mut *conn, cp.project_id, &group.member_guids).await?;
        return Ok(None);
    }
    Err(CoreError::Internal(format!("checkpoint {} has no target", cp.id)).into())
}

pub struct InspectionWorkflow;

impl InspectionWorkflow {
    // -----------------------------------------------------------------------
    // Checkpoints
    // -----------------------------------------------------------------------

    /// Create a checkpoint on exactly one element or one group.
    pub async fn create_checkpoint(
        pool: &PgPool,
        project_id: DbId,
        input: &CreateCheckpoint,
        actor: &str,
    ) -> Result<Checkpoint, EngineError> {
        if input.name.trim().is_empty() {
            return Err(CoreError::Validation("Checkpoint name must not be empty".to_string()).into());
        }

        let mut tx = pool.begin().await?;

        match (input.element_id, input.group_id) {
            (Some(element_id), None) => {
                ElementRepo::find_by_id(&mut *tx, project_id, element_id)
                    .await?
                    .ok_or_else(|| CoreError::not_found("element", element_id))?;
            }
            (None, Some(group_id)) => {
                CheckpointGroupRepo::find_by_id(&mut *tx, project_id, group_id)
                    .await?
                    .ok_or_else(|| CoreError::not_found("checkpoint_group", group_id))?;
            }
            _ => {
                return Err(CoreError::Validation(
                    "A checkpoint targets exactly one of element_id or group_id".to_string(),
                )
                .into());
            }
        }

        let cp = CheckpointRepo::create(&mut *tx, project_id, input).await?;
        AuditLogRepo::record(
            &mut *tx,
            &AuditDraft::created(project_id, EntityType::Checkpoint, cp.id, snapshot(&cp)?, actor),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(project_id, checkpoint_id = cp.id, "Checkpoint created");
        Ok(cp)
    }

    pub async fn get_checkpoint(
        pool: &PgPool,
        project_id: DbId,
        checkpoint_id: DbId,
    ) -> Result<Checkpoint, EngineError> {
        match CheckpointRepo::find_by_id(pool, checkpoint_id).await? {
            Some(cp) if cp.project_id == project_id => Ok(cp),
            _ => Err(checkpoint_not_found(checkpoint_id)),
        }
    }

    pub async fn list_checkpoints(
        pool: &PgPool,
        project_id: DbId,
        status: Option<&str>,
    ) -> Result<Vec<Checkpoint>, EngineError> {
        let status = status.map(InspectionStatus::from_str_db).transpose()?;
        Ok(CheckpointRepo::list_by_project(pool, project_id, status.map(|s| s.as_str())).await?)
    }

    pub async fn list_for_element(
        pool: &PgPool,
        project_id: DbId,
        element_id: DbId,
    ) -> Result<Vec<Checkpoint>, EngineError> {
        ElementRepo::find_by_id(pool, project_id, element_id)
            .await?
            .ok_or_else(|| CoreError::not_found("element", element_id))?;
        Ok(CheckpointRepo::list_by_element(pool, element_id).await?)
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Apply one workflow action. A rejected action leaves no trace.
    pub async fn transition(
        pool: &PgPool,
        project_id: DbId,
        checkpoint_id: DbId,
        request: &TransitionRequest,
        actor: &Actor,
    ) -> Result<Checkpoint, EngineError> {
        Self::transition_tagged(pool, project_id, checkpoint_id, request, actor, None).await
    }

    /// [`Self::transition`] with the audit entry tagged by a bulk call.
    pub async fn transition_tagged(
        pool: &PgPool,
        project_id: DbId,
        checkpoint_id: DbId,
        request: &TransitionRequest,
        actor: &Actor,
        bulk_action_id: Option<Uuid>,
    ) -> Result<Checkpoint, EngineError> {
        let mut tx = pool.begin().await?;
        let updated = Self::transition_in(
            &mut *tx,
            project_id,
            checkpoint_id,
            request,
            actor,
            bulk_action_id,
        )
        .await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Apply a transition on a caller-owned transaction. Nothing is visible
    /// until the caller commits.
    pub async fn transition_in(
        conn: &mut PgConnection,
        project_id: DbId,
        checkpoint_id: DbId,
        request: &TransitionRequest,
        actor: &Actor,
        bulk_action_id: Option<Uuid>,
    ) -> Result<Checkpoint, EngineError> {
        let cp = lock_checkpoint(&mut *conn, project_id, checkpoint_id).await?;
        lock_owner(&mut *conn, &cp).await?;

        let outcome = plan_transition(&cp.state()?, request, actor, Utc::now())?;
        let updated = CheckpointRepo::apply_state(&mut *conn, cp.id, &outcome.next).await?;

        AuditLogRepo::record(
            &mut *conn,
            &AuditDraft::changed(
                project_id,
                EntityType::Checkpoint,
                cp.id,
                outcome.audit_action,
                &snapshot(&cp)?,
                &snapshot(&updated)?,
                &actor.name,
            )
            .in_bulk(bulk_action_id),
        )
        .await?;

        tracing::info!(
            project_id,
            checkpoint_id,
            action = request.action.as_str(),
            from = %cp.status,
            to = %updated.status,
            actor = %actor.name,
            bulk_action_id = ?bulk_action_id,
            "Checkpoint transitioned",
        );
        Ok(updated)
    }

    // -----------------------------------------------------------------------
    // Results
    // -----------------------------------------------------------------------

    /// Record a measurement, photo or comment. The first result on a
    /// not-started checkpoint starts it.
    pub async fn record_result(
        pool: &PgPool,
        project_id: DbId,
        checkpoint_id: DbId,
        input: &ResultInput,
        actor: &Actor,
    ) -> Result<InspectionResult, EngineError> {
        let mut tx = pool.begin().await?;
        let result = Self::record_result_in(&mut *tx, project_id, checkpoint_id, input, actor).await?;
        tx.commit().await?;
        Ok(result)
    }

    /// [`Self::record_result`] on a caller-owned transaction.
    pub async fn record_result_in(
        conn: &mut PgConnection,
        project_id: DbId,
        checkpoint_id: DbId,
        input: &ResultInput,
        actor: &Actor,
    ) -> Result<InspectionResult, EngineError> {
        input.validate()?;

        let cp = lock_checkpoint(&mut *conn, project_id, checkpoint_id).await?;
        let element_guid = lock_owner(&mut *conn, &cp).await?;

        let state = cp.state()?;
        ensure_result_writable(&state)?;

        if let Some(outcome) = auto_start(&state, actor, Utc::now())? {
            let started = CheckpointRepo::apply_state(&mut *conn, cp.id, &outcome.next).await?;
            AuditLogRepo::record(
                &mut *conn,
                &AuditDraft::changed(
                    project_id,
                    EntityType::Checkpoint,
                    cp.id,
                    outcome.audit_action,
                    &snapshot(&cp)?,
                    &snapshot(&started)?,
                    &actor.name,
                ),
            )
            .await?;
        }

        let result = InspectionResultRepo::create(
            &mut *conn,
            &CreateInspectionResult {
                project_id,
                checkpoint_id: cp.id,
                element_guid,
                kind: input.kind,
                value_numeric: input.value_numeric,
                value_text: input.value_text.clone(),
                photo_url: input.photo_url.clone(),
                recorded_by: actor.name.clone(),
            },
        )
        .await?;

        let action = match input.kind {
            ResultKind::Measurement => AuditAction::Update,
            ResultKind::Photo => AuditAction::PhotoAdded,
            ResultKind::Comment => AuditAction::CommentAdded,
        };
        AuditLogRepo::record(
            &mut *conn,
            &AuditDraft::appended(
                project_id,
                EntityType::Checkpoint,
                cp.id,
                action,
                json!({
                    "result_id": result.id,
                    "kind": result.kind,
                    "element_guid": result.element_guid,
                    "value_numeric": result.value_numeric,
                    "value_text": result.value_text,
                    "photo_url": result.photo_url,
                }),
                &actor.name,
            ),
        )
        .await?;

        tracing::info!(
            project_id,
            checkpoint_id,
            result_id = result.id,
            kind = input.kind.as_str(),
            "Inspection result recorded",
        );
        Ok(result)
    }

    pub async fn list_results(
        pool: &PgPool,
        project_id: DbId,
        checkpoint_id: DbId,
    ) -> Result<Vec<InspectionResult>, EngineError> {
        Self::get_checkpoint(pool, project_id, checkpoint_id).await?;
        Ok(InspectionResultRepo::list_by_checkpoint(pool, checkpoint_id).await?)
    }

    /// Lazy newest-first history of a checkpoint's workflow state.
    pub async fn history(
        pool: &PgPool,
        project_id: DbId,
        checkpoint_id: DbId,
    ) -> Result<EntityHistory, EngineError> {
        let mut tx = begin_snapshot(pool).await?;
        let cp = match CheckpointRepo::find_by_id(&mut *tx, checkpoint_id).await? {
            Some(cp) if cp.project_id == project_id => cp,
            _ => return Err(checkpoint_not_found(checkpoint_id)),
        };
        let latest = EntityHistory::bound(&mut *tx, EntityType::Checkpoint, cp.id).await?;
        tx.commit().await?;

        Ok(EntityHistory::new(
            pool.clone(),
            EntityType::Checkpoint,
            cp.id,
            snapshot(&cp)?,
            latest,
        ))
    }
}
