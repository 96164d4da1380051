//! Offline upload queue: submission and replay.
//!
//! Devices that were offline submit their writes here. The worker claims
//! due items and replays each through the same workflow entry points an
//! online call would use. Failures are retried with backoff until the
//! attempt budget runs out; domain errors fail immediately.
//!
//! The replayed write and the completion of its claim commit in one
//! transaction. A claim that went stale and was taken again by another
//! cycle no longer completes, so the stale attempt rolls back and the
//! write lands at most once.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use sitecheck_core::element::validate_guid;
use sitecheck_core::error::CoreError;
use sitecheck_core::types::DbId;
use sitecheck_core::upload_queue::{RetryDecision, RetryPolicy, UploadPayload, UploadStatus};
use sitecheck_core::workflow::{Actor, TransitionRequest};
use sitecheck_db::models::upload_queue::{CreateUploadQueueItem, StaleRelease, UploadQueueItem};
use sitecheck_db::repositories::UploadQueueRepo;

use crate::error::EngineError;
use crate::workflow::InspectionWorkflow;

/// Default number of items claimed per replay cycle.
pub const DEFAULT_BATCH_SIZE: i64 = 20;

/// Default bound on waiting for a row lock held by an online writer.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// What one replay cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub claimed: usize,
    pub completed: usize,
    pub retried: usize,
    pub failed: usize,
    /// Claims lost to a newer claim of the same item.
    pub superseded: usize,
    /// Items whose outcome could not be recorded. They stay `processing`
    /// until released as stale.
    pub errored: usize,
}

/// Outcome of replaying a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    Completed,
    Retried,
    Failed,
    Superseded,
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// Queue an offline write for replay. Resubmitting a known `client_ref`
/// returns the existing item.
pub async fn submit(
    pool: &PgPool,
    project_id: DbId,
    input: &CreateUploadQueueItem,
    actor: &Actor,
) -> Result<UploadQueueItem, EngineError> {
    if let Some(guid) = &input.element_guid {
        validate_guid(guid)?;
    }
    if let UploadPayload::RecordResult { result, .. } = &input.payload {
        result.validate()?;
    }
    if input.client_ref.as_deref().is_some_and(|r| r.trim().is_empty()) {
        return Err(CoreError::Validation("client_ref must not be blank".to_string()).into());
    }

    let item = UploadQueueRepo::enqueue(pool, project_id, input, actor).await?;
    tracing::debug!(project_id, upload_id = item.id, client_ref = ?item.client_ref, "Upload queued");
    Ok(item)
}

pub async fn list(
    pool: &PgPool,
    project_id: DbId,
    status: Option<&str>,
) -> Result<Vec<UploadQueueItem>, EngineError> {
    let status = status.map(UploadStatus::from_str_db).transpose()?;
    Ok(UploadQueueRepo::list(pool, project_id, status).await?)
}

/// Put a terminally failed item back in line with a fresh attempt budget.
pub async fn requeue(
    pool: &PgPool,
    project_id: DbId,
    upload_id: DbId,
) -> Result<UploadQueueItem, EngineError> {
    if let Some(item) = UploadQueueRepo::requeue(pool, project_id, upload_id).await? {
        tracing::info!(project_id, upload_id, "Upload re-queued");
        return Ok(item);
    }
    match UploadQueueRepo::find_by_id(pool, upload_id).await? {
        Some(item) if item.project_id == project_id => Err(CoreError::Conflict(format!(
            "Upload {upload_id} is '{}'; only failed uploads can be re-queued",
            item.status
        ))
        .into()),
        _ => Err(CoreError::not_found("upload", upload_id).into()),
    }
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

/// Replays due queue items in batches.
pub struct UploadReplayer {
    pool: PgPool,
    policy: RetryPolicy,
    batch_size: i64,
    lock_timeout: Duration,
}

impl UploadReplayer {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            policy: RetryPolicy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Give up on a replay that waits longer than `lock_timeout` for a row
    /// lock. The attempt counts as a retryable failure.
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout.max(Duration::from_millis(1));
        self
    }

    /// Claim one batch of due items and replay them in order. An item whose
    /// outcome cannot be recorded is logged and skipped; the rest of the
    /// batch still runs.
    pub async fn replay_due(&self) -> Result<ReplaySummary, EngineError> {
        let items = UploadQueueRepo::claim_due(&self.pool, self.batch_size).await?;
        let mut summary = ReplaySummary {
            claimed: items.len(),
            ..Default::default()
        };

        for item in &items {
            match self.replay_one(item).await {
                Ok(ReplayOutcome::Completed) => summary.completed += 1,
                Ok(ReplayOutcome::Retried) => summary.retried += 1,
                Ok(ReplayOutcome::Failed) => summary.failed += 1,
                Ok(ReplayOutcome::Superseded) => summary.superseded += 1,
                Err(e) => {
                    summary.errored += 1;
                    tracing::error!(
                        upload_id = item.id,
                        attempts = item.attempts,
                        error = %e,
                        "Could not record upload replay outcome",
                    );
                }
            }
        }

        if summary.claimed > 0 {
            tracing::info!(
                claimed = summary.claimed,
                completed = summary.completed,
                retried = summary.retried,
                failed = summary.failed,
                superseded = summary.superseded,
                errored = summary.errored,
                "Upload replay cycle finished",
            );
        }
        Ok(summary)
    }

    /// Replay one claimed item and record the outcome on it. Only a failure
    /// to record the outcome is returned as an error.
    pub async fn replay_one(&self, item: &UploadQueueItem) -> Result<ReplayOutcome, EngineError> {
        let mut tx = self.pool.begin().await?;
        let applied = match self.set_lock_timeout(&mut *tx).await {
            Ok(()) => self.apply(&mut *tx, item).await,
            Err(e) => Err(e),
        };

        match applied {
            Ok(()) => {
                if UploadQueueRepo::mark_completed(&mut *tx, item.id, item.attempts).await? {
                    tx.commit().await?;
                    tracing::debug!(upload_id = item.id, "Upload replayed");
                    Ok(ReplayOutcome::Completed)
                } else {
                    tx.rollback().await?;
                    tracing::warn!(
                        upload_id = item.id,
                        attempts = item.attempts,
                        "Upload claim superseded, replay rolled back",
                    );
                    Ok(ReplayOutcome::Superseded)
                }
            }
            Err(e) => {
                tx.rollback().await?;
                self.record_failure(item, &e).await
            }
        }
    }

    async fn record_failure(
        &self,
        item: &UploadQueueItem,
        e: &EngineError,
    ) -> Result<ReplayOutcome, EngineError> {
        let message = e.to_string();
        match self.policy.decide(item.attempts, e.is_retryable(), Utc::now()) {
            RetryDecision::RetryAt(at) => {
                UploadQueueRepo::mark_retry(&self.pool, item.id, at, &message, e.code()).await?;
                tracing::warn!(
                    upload_id = item.id,
                    attempts = item.attempts,
                    next_attempt_at = %at,
                    error = %e,
                    "Upload replay failed, will retry",
                );
                Ok(ReplayOutcome::Retried)
            }
            RetryDecision::GiveUp => {
                UploadQueueRepo::mark_failed(&self.pool, item.id, &message, e.code()).await?;
                tracing::error!(
                    upload_id = item.id,
                    attempts = item.attempts,
                    code = e.code(),
                    error = %e,
                    "Upload replay failed permanently",
                );
                Ok(ReplayOutcome::Failed)
            }
        }
    }

    async fn set_lock_timeout(&self, conn: &mut PgConnection) -> Result<(), EngineError> {
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(conn)
            .await?;
        Ok(())
    }

    async fn apply(&self, conn: &mut PgConnection, item: &UploadQueueItem) -> Result<(), EngineError> {
        let actor = item.actor()?;
        match item.payload()? {
            UploadPayload::RecordResult {
                checkpoint_id,
                result,
            } => {
                InspectionWorkflow::record_result_in(
                    conn,
                    item.project_id,
                    checkpoint_id,
                    &result,
                    &actor,
                )
                .await?;
            }
            UploadPayload::Transition {
                checkpoint_id,
                action,
                comment,
                assignee,
            } => {
                let request = TransitionRequest {
                    action,
                    comment,
                    assignee,
                };
                InspectionWorkflow::transition_in(
                    conn,
                    item.project_id,
                    checkpoint_id,
                    &request,
                    &actor,
                    None,
                )
                .await?;
            }
        }
        Ok(())
    }

    /// Settle items stuck in `processing` for longer than `stale_after`.
    /// Items that already used the whole attempt budget fail instead of
    /// going back to the queue.
    pub async fn release_stale(&self, stale_after: Duration) -> Result<StaleRelease, EngineError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(stale_after)
                .map_err(|e| CoreError::Validation(format!("stale_after out of range: {e}")))?;
        let released =
            UploadQueueRepo::release_stale(&self.pool, cutoff, self.policy.max_attempts).await?;
        if released.requeued > 0 || released.failed > 0 {
            tracing::warn!(
                requeued = released.requeued,
                failed = released.failed,
                "Released stale uploads",
            );
        }
        Ok(released)
    }
}
