//! Bulk review actions over many checkpoints.
//!
//! Each target runs in its own transaction through the regular transition
//! path, so one failing target never blocks or undoes the others. Every
//! audit entry written by the call carries the same `bulk_action_id`.

use sqlx::PgPool;
use sitecheck_core::bulk::{prepare_targets, run_per_item, BulkAction, BulkParams, BulkResult};
use sitecheck_core::error::CoreError;
use sitecheck_core::types::DbId;
use sitecheck_core::workflow::Actor;
use sitecheck_db::models::bulk_action::{BulkActionLog, CreateBulkActionLog};
use sitecheck_db::repositories::BulkActionLogRepo;
use uuid::Uuid;

use crate::error::EngineError;
use crate::workflow::InspectionWorkflow;

/// Default number of bulk calls returned by [`BulkOperations::list_logs`].
pub const DEFAULT_LOG_LIMIT: i64 = 50;

pub struct BulkOperations;

impl BulkOperations {
    /// Apply `action` to every target and report per-item outcomes.
    ///
    /// Only an invalid target list fails the whole call; per-target errors
    /// (wrong status, missing checkpoint, role) are reported in the result.
    pub async fn apply_bulk(
        pool: &PgPool,
        project_id: DbId,
        action: BulkAction,
        target_ids: &[DbId],
        actor: &Actor,
        params: &BulkParams,
    ) -> Result<BulkResult, EngineError> {
        let targets = prepare_targets(target_ids)?;
        let bulk_action_id = Uuid::now_v7();
        let request = params.request_for(action);

        tracing::info!(
            project_id,
            %bulk_action_id,
            action = action.as_str(),
            targets = targets.len(),
            actor = %actor.name,
            "Bulk action started",
        );

        let request = &request;
        let results = run_per_item(&targets, move |checkpoint_id| async move {
            InspectionWorkflow::transition_tagged(
                pool,
                project_id,
                checkpoint_id,
                request,
                actor,
                Some(bulk_action_id),
            )
            .await
            .map(|_| ())
        })
        .await;

        let result = BulkResult::new(bulk_action_id, action, results);

        let params_json = serde_json::to_value(params)
            .map_err(|e| CoreError::Internal(format!("bulk params: {e}")))?;
        let results_json = serde_json::to_value(&result.results)
            .map_err(|e| CoreError::Internal(format!("bulk results: {e}")))?;
        BulkActionLogRepo::create(
            pool,
            &CreateBulkActionLog {
                bulk_action_id,
                project_id,
                action: action.as_str().to_string(),
                target_ids: targets,
                params: params_json,
                success_count: result.success_count as i32,
                failure_count: result.failure_count as i32,
                results: results_json,
                actor: actor.name.clone(),
            },
        )
        .await?;

        tracing::info!(
            project_id,
            %bulk_action_id,
            success_count = result.success_count,
            failure_count = result.failure_count,
            "Bulk action finished",
        );
        Ok(result)
    }

    pub async fn find_log(
        pool: &PgPool,
        project_id: DbId,
        bulk_action_id: Uuid,
    ) -> Result<BulkActionLog, EngineError> {
        match BulkActionLogRepo::find_by_bulk_action_id(pool, bulk_action_id).await? {
            Some(log) if log.project_id == project_id => Ok(log),
            _ => Err(CoreError::NotFound {
                entity: "bulk_action",
                id: bulk_action_id.to_string(),
            }
            .into()),
        }
    }

    pub async fn list_logs(
        pool: &PgPool,
        project_id: DbId,
        limit: Option<i64>,
    ) -> Result<Vec<BulkActionLog>, EngineError> {
        let limit = limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, 500);
        Ok(BulkActionLogRepo::list_by_project(pool, project_id, limit).await?)
    }
}
