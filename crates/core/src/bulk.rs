//! Bulk review actions: target validation and per-item result aggregation.

use std::fmt::Display;
use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::types::DbId;
use crate::workflow::{TransitionRequest, WorkflowAction};

/// Maximum number of distinct targets in one bulk call.
pub const MAX_BULK_TARGETS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    Start,
    Complete,
    Approve,
    Reject,
    Return,
    Unlock,
    Assign,
}

impl BulkAction {
    pub fn as_str(&self) -> &'static str {
        self.workflow_action().as_str()
    }

    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "start" => Ok(Self::Start),
            "complete" => Ok(Self::Complete),
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            "return" => Ok(Self::Return),
            "unlock" => Ok(Self::Unlock),
            "assign" => Ok(Self::Assign),
            other => Err(CoreError::Validation(format!(
                "Unknown bulk action '{other}'. Must be one of: start, complete, approve, reject, return, unlock, assign"
            ))),
        }
    }

    pub fn workflow_action(&self) -> WorkflowAction {
        match self {
            Self::Start => WorkflowAction::Start,
            Self::Complete => WorkflowAction::Complete,
            Self::Approve => WorkflowAction::Approve,
            Self::Reject => WorkflowAction::Reject,
            Self::Return => WorkflowAction::Return,
            Self::Unlock => WorkflowAction::Unlock,
            Self::Assign => WorkflowAction::Assign,
        }
    }
}

/// Shared parameters applied to every target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkParams {
    pub comment: Option<String>,
    pub assignee: Option<String>,
}

impl BulkParams {
    pub fn request_for(&self, action: BulkAction) -> TransitionRequest {
        TransitionRequest {
            action: action.workflow_action(),
            comment: self.comment.clone(),
            assignee: self.assignee.clone(),
        }
    }
}

/// Validate a target list and remove duplicates, first occurrence kept.
pub fn prepare_targets(target_ids: &[DbId]) -> Result<Vec<DbId>, CoreError> {
    if target_ids.is_empty() {
        return Err(CoreError::Validation(
            "Bulk action needs at least one target".to_string(),
        ));
    }
    let mut out: Vec<DbId> = Vec::with_capacity(target_ids.len());
    for id in target_ids {
        if !out.contains(id) {
            out.push(*id);
        }
    }
    if out.len() > MAX_BULK_TARGETS {
        return Err(CoreError::Validation(format!(
            "Bulk action exceeds maximum of {MAX_BULK_TARGETS} targets (got {})",
            out.len()
        )));
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Errors that can be reported per bulk item.
pub trait ErrorCode: Display {
    fn code(&self) -> &'static str;
}

impl ErrorCode for CoreError {
    fn code(&self) -> &'static str {
        CoreError::code(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItemResult {
    pub id: DbId,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl BulkItemResult {
    pub fn ok(id: DbId) -> Self {
        Self {
            id,
            success: true,
            error: None,
            code: None,
        }
    }

    pub fn failed(id: DbId, err: &impl ErrorCode) -> Self {
        Self {
            id,
            success: false,
            error: Some(err.to_string()),
            code: Some(err.code().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkResult {
    pub bulk_action_id: Uuid,
    pub action: BulkAction,
    pub results: Vec<BulkItemResult>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl BulkResult {
    pub fn new(bulk_action_id: Uuid, action: BulkAction, results: Vec<BulkItemResult>) -> Self {
        let success_count = results.iter().filter(|r| r.success).count();
        let failure_count = results.len() - success_count;
        Self {
            bulk_action_id,
            action,
            results,
            success_count,
            failure_count,
        }
    }
}

/// Run `apply` over each target in order. A failure is recorded and the
/// loop moves on; it never aborts the remaining targets.
pub async fn run_per_item<F, Fut, E>(targets: &[DbId], mut apply: F) -> Vec<BulkItemResult>
where
    F: FnMut(DbId) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: ErrorCode,
{
    let mut results = Vec::with_capacity(targets.len());
    for &id in targets {
        let item = match apply(id).await {
            Ok(()) => BulkItemResult::ok(id),
            Err(e) => BulkItemResult::failed(id, &e),
        };
        results.push(item);
    }
    results
}
