//! Inspection workflow state machine.
//!
//! Checkpoints move through `not_started -> in_progress -> completed` and
//! are then decided by a reviewer (`approved`, `rejected` or `returned`).
//! `returned` re-opens the checkpoint; `approved` and `rejected` are
//! terminal until an admin unlocks them.
//!
//! [`plan_transition`] is pure: it validates the request against the
//! current state and returns the next state plus the audit action to
//! record. Persistence and row locking live in the engine crate.

use serde::{Deserialize, Serialize};

use crate::audit::AuditAction;
use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionStatus {
    NotStarted,
    InProgress,
    Completed,
    Approved,
    Rejected,
    Returned,
}

pub const ALL_STATUSES: &[InspectionStatus] = &[
    InspectionStatus::NotStarted,
    InspectionStatus::InProgress,
    InspectionStatus::Completed,
    InspectionStatus::Approved,
    InspectionStatus::Rejected,
    InspectionStatus::Returned,
];

impl InspectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Returned => "returned",
        }
    }

    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        ALL_STATUSES
            .iter()
            .copied()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Invalid inspection status '{s}'. Must be one of: not_started, in_progress, completed, approved, rejected, returned"
                ))
            })
    }

    /// Terminal until an explicit unlock.
    pub fn is_decided(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

/// Viewer color for a checkpoint status, as a hex RGB string.
pub fn status_color(status: InspectionStatus) -> &'static str {
    match status {
        InspectionStatus::NotStarted => "#9e9e9e",
        InspectionStatus::InProgress => "#2196f3",
        InspectionStatus::Completed => "#ff9800",
        InspectionStatus::Approved => "#4caf50",
        InspectionStatus::Rejected => "#f44336",
        InspectionStatus::Returned => "#9c27b0",
    }
}

// ---------------------------------------------------------------------------
// Actions and actors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowAction {
    Start,
    Complete,
    Approve,
    Reject,
    Return,
    Unlock,
    Assign,
}

impl WorkflowAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Return => "return",
            Self::Unlock => "unlock",
            Self::Assign => "assign",
        }
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
                "Unknown workflow action '{other}'"
            ))),
        }
    }

    /// Reviewer decisions on a completed checkpoint.
    pub fn is_decision(&self) -> bool {
        matches!(self, Self::Approve | Self::Reject | Self::Return)
    }

    pub fn requires_comment(&self) -> bool {
        matches!(self, Self::Reject | Self::Return)
    }

    /// Statuses this action may be applied from.
    pub fn valid_sources(&self) -> &'static [InspectionStatus] {
        use InspectionStatus::*;
        match self {
            Self::Start => &[NotStarted, Returned],
            Self::Complete => &[InProgress, Returned],
            Self::Approve | Self::Reject | Self::Return => &[Completed],
            Self::Unlock => &[Approved, Rejected],
            Self::Assign => &[NotStarted, InProgress, Completed, Returned],
        }
    }

    pub fn audit_action(&self) -> AuditAction {
        match self {
            Self::Start | Self::Complete => AuditAction::StatusChanged,
            Self::Approve => AuditAction::Approved,
            Self::Reject => AuditAction::Rejected,
            Self::Return => AuditAction::Returned,
            Self::Unlock => AuditAction::Unlocked,
            Self::Assign => AuditAction::Assigned,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Inspector,
    Reviewer,
    Admin,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inspector => "inspector",
            Self::Reviewer => "reviewer",
            Self::Admin => "admin",
        }
    }

    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "inspector" => Ok(Self::Inspector),
            "reviewer" => Ok(Self::Reviewer),
            "admin" => Ok(Self::Admin),
            other => Err(CoreError::Validation(format!(
                "Unknown role '{other}'. Must be one of: inspector, reviewer, admin"
            ))),
        }
    }

    pub fn can_review(&self) -> bool {
        matches!(self, Self::Reviewer | Self::Admin)
    }
}

/// The user performing an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(name: impl Into<String>, role: ActorRole) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }
}

// ---------------------------------------------------------------------------
// Checkpoint state
// ---------------------------------------------------------------------------

/// Workflow fields of a checkpoint. Serialized as the audit snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    pub status: InspectionStatus,
    pub can_edit: bool,
    pub started_at: Option<Timestamp>,
    pub started_by: Option<String>,
    pub completed_at: Option<Timestamp>,
    pub completed_by: Option<String>,
    pub reviewed_at: Option<Timestamp>,
    pub reviewed_by: Option<String>,
    pub review_comment: Option<String>,
    pub locked_at: Option<Timestamp>,
    pub locked_by: Option<String>,
    pub unlocked_at: Option<Timestamp>,
    pub unlocked_by: Option<String>,
    pub assigned_to: Option<String>,
}

impl Default for CheckpointState {
    fn default() -> Self {
        Self {
            status: InspectionStatus::NotStarted,
            can_edit: true,
            started_at: None,
            started_by: None,
            completed_at: None,
            completed_by: None,
            reviewed_at: None,
            reviewed_by: None,
            review_comment: None,
            locked_at: None,
            locked_by: None,
            unlocked_at: None,
            unlocked_by: None,
            assigned_to: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRequest {
    pub action: WorkflowAction,
    pub comment: Option<String>,
    /// Required for [`WorkflowAction::Assign`], ignored otherwise.
    pub assignee: Option<String>,
}

impl TransitionRequest {
    pub fn new(action: WorkflowAction) -> Self {
        Self {
            action,
            comment: None,
            assignee: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub next: CheckpointState,
    pub audit_action: AuditAction,
}

// ---------------------------------------------------------------------------
// Transition planning
// ---------------------------------------------------------------------------

/// Validate `request` against `current` and compute the resulting state.
///
/// Check order: role, then source status, then the edit lock, then
/// request payload. A failed check leaves nothing to persist.
pub fn plan_transition(
    current: &CheckpointState,
    request: &TransitionRequest,
    actor: &Actor,
    now: Timestamp,
) -> Result<TransitionOutcome, CoreError> {
    let action = request.action;

    if action.is_decision() && !actor.role.can_review() {
        return Err(CoreError::Forbidden(format!(
            "Only reviewers may {} a checkpoint",
            action.as_str()
        )));
    }
    if action == WorkflowAction::Unlock && actor.role != ActorRole::Admin {
        return Err(CoreError::Forbidden(
            "Only admins may unlock a checkpoint".to_string(),
        ));
    }

    if !action.valid_sources().contains(&current.status) {
        return Err(invalid(current, action, None));
    }

    if !current.can_edit && !action.is_decision() && action != WorkflowAction::Unlock {
        return Err(invalid(
            current,
            action,
            Some("checkpoint is not editable".to_string()),
        ));
    }

    let comment = non_blank(request.comment.as_deref());
    if action.requires_comment() && comment.is_none() {
        return Err(CoreError::Validation(format!(
            "A comment is required to {} a checkpoint",
            action.as_str()
        )));
    }

    let who = Some(actor.name.clone());
    let mut next = current.clone();
    match action {
        WorkflowAction::Start => {
            next.status = InspectionStatus::InProgress;
            next.started_at = Some(now);
            next.started_by = who;
        }
        WorkflowAction::Complete => {
            next.status = InspectionStatus::Completed;
            next.completed_at = Some(now);
            next.completed_by = who;
        }
        WorkflowAction::Approve => {
            next.status = InspectionStatus::Approved;
            next.can_edit = false;
            next.reviewed_at = Some(now);
            next.reviewed_by = who.clone();
            next.review_comment = comment;
            next.locked_at = Some(now);
            next.locked_by = who;
        }
        WorkflowAction::Reject => {
            next.status = InspectionStatus::Rejected;
            next.can_edit = false;
            next.reviewed_at = Some(now);
            next.reviewed_by = who;
            next.review_comment = comment;
        }
        WorkflowAction::Return => {
            next.status = InspectionStatus::Returned;
            next.can_edit = true;
            next.reviewed_at = Some(now);
            next.reviewed_by = who;
            next.review_comment = comment;
        }
        WorkflowAction::Unlock => {
            next.status = InspectionStatus::InProgress;
            next.can_edit = true;
            next.locked_at = None;
            next.locked_by = None;
            next.unlocked_at = Some(now);
            next.unlocked_by = who;
        }
        WorkflowAction::Assign => {
            let assignee = non_blank(request.assignee.as_deref()).ok_or_else(|| {
                CoreError::Validation("An assignee is required to assign a checkpoint".to_string())
            })?;
            next.assigned_to = Some(assignee);
        }
    }

    Ok(TransitionOutcome {
        next,
        audit_action: action.audit_action(),
    })
}

/// Start a not-started checkpoint implicitly, e.g. when the first result
/// is recorded. Returns `None` when no transition is needed.
pub fn auto_start(
    current: &CheckpointState,
    actor: &Actor,
    now: Timestamp,
) -> Result<Option<TransitionOutcome>, CoreError> {
    if current.status != InspectionStatus::NotStarted {
        return Ok(None);
    }
    plan_transition(current, &TransitionRequest::new(WorkflowAction::Start), actor, now).map(Some)
}

/// Reject writes of inspection results to a checkpoint that is locked for
/// editing or already approved or rejected.
pub fn ensure_result_writable(current: &CheckpointState) -> Result<(), CoreError> {
    if !current.can_edit || current.status.is_decided() {
        return Err(CoreError::InvalidTransition {
            from: current.status.as_str().to_string(),
            action: "record a result on".to_string(),
            reason: Some("checkpoint is not editable".to_string()),
        });
    }
    Ok(())
}

fn invalid(current: &CheckpointState, action: WorkflowAction, reason: Option<String>) -> CoreError {
    CoreError::InvalidTransition {
        from: current.status.as_str().to_string(),
        action: action.as_str().to_string(),
        reason,
    }
}

fn non_blank(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn inspector() -> Actor {
        Actor::new("ivan", ActorRole::Inspector)
    }

    fn reviewer() -> Actor {
        Actor::new("rita", ActorRole::Reviewer)
    }

    fn admin() -> Actor {
        Actor::new("ada", ActorRole::Admin)
    }

    fn step(state: &CheckpointState, req: TransitionRequest, actor: &Actor) -> CheckpointState {
        plan_transition(state, &req, actor, Utc::now()).unwrap().next
    }

    fn completed() -> CheckpointState {
        let s = step(&CheckpointState::default(), TransitionRequest::new(WorkflowAction::Start), &inspector());
        step(&s, TransitionRequest::new(WorkflowAction::Complete), &inspector())
    }

    #[test]
    fn status_strings_round_trip() {
        for s in ALL_STATUSES {
            assert_eq!(InspectionStatus::from_str_db(s.as_str()).unwrap(), *s);
        }
        assert!(InspectionStatus::from_str_db("done").is_err());
    }

    #[test]
    fn every_status_has_a_distinct_color() {
        let mut colors: Vec<_> = ALL_STATUSES.iter().map(|s| status_color(*s)).collect();
        colors.sort();
        colors.dedup();
        assert_eq!(colors.len(), ALL_STATUSES.len());
    }

    #[test]
    fn happy_path_records_actors() {
        let s = step(&CheckpointState::default(), TransitionRequest::new(WorkflowAction::Start), &inspector());
        assert_eq!(s.status, InspectionStatus::InProgress);
        assert_eq!(s.started_by.as_deref(), Some("ivan"));

        let s = step(&s, TransitionRequest::new(WorkflowAction::Complete), &inspector());
        assert_eq!(s.status, InspectionStatus::Completed);
        assert!(s.can_edit);
        assert!(s.completed_at.is_some());
    }

    #[test]
    fn approve_locks_the_checkpoint() {
        let out = plan_transition(
            &completed(),
            &TransitionRequest::new(WorkflowAction::Approve),
            &reviewer(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(out.audit_action, AuditAction::Approved);
        assert_eq!(out.next.status, InspectionStatus::Approved);
        assert!(!out.next.can_edit);
        assert_eq!(out.next.locked_by.as_deref(), Some("rita"));
        assert_eq!(out.next.reviewed_by.as_deref(), Some("rita"));
    }

    #[test]
    fn approving_twice_is_an_invalid_transition() {
        let approved = step(&completed(), TransitionRequest::new(WorkflowAction::Approve), &reviewer());
        assert_matches!(
            plan_transition(&approved, &TransitionRequest::new(WorkflowAction::Approve), &reviewer(), Utc::now()),
            Err(CoreError::InvalidTransition { ref from, .. }) if from == "approved"
        );
    }

    #[test]
    fn inspector_cannot_decide() {
        assert_matches!(
            plan_transition(&completed(), &TransitionRequest::new(WorkflowAction::Approve), &inspector(), Utc::now()),
            Err(CoreError::Forbidden(_))
        );
    }

    #[test]
    fn reject_and_return_need_a_comment() {
        for action in [WorkflowAction::Reject, WorkflowAction::Return] {
            assert_matches!(
                plan_transition(&completed(), &TransitionRequest::new(action), &reviewer(), Utc::now()),
                Err(CoreError::Validation(_))
            );
            assert_matches!(
                plan_transition(&completed(), &TransitionRequest::new(action).with_comment("  "), &reviewer(), Utc::now()),
                Err(CoreError::Validation(_))
            );
        }
    }

    #[test]
    fn rejected_is_read_only_returned_is_editable() {
        let rejected = step(
            &completed(),
            TransitionRequest::new(WorkflowAction::Reject).with_comment("weld missing"),
            &reviewer(),
        );
        assert!(!rejected.can_edit);
        assert_eq!(rejected.review_comment.as_deref(), Some("weld missing"));

        let returned = step(
            &completed(),
            TransitionRequest::new(WorkflowAction::Return).with_comment("retake photo"),
            &reviewer(),
        );
        assert!(returned.can_edit);
        let again = step(&returned, TransitionRequest::new(WorkflowAction::Complete), &inspector());
        assert_eq!(again.status, InspectionStatus::Completed);
    }

    #[test]
    fn returned_can_be_restarted() {
        let returned = step(
            &completed(),
            TransitionRequest::new(WorkflowAction::Return).with_comment("redo"),
            &reviewer(),
        );
        let s = step(&returned, TransitionRequest::new(WorkflowAction::Start), &inspector());
        assert_eq!(s.status, InspectionStatus::InProgress);
    }

    #[test]
    fn unlock_is_admin_only() {
        let approved = step(&completed(), TransitionRequest::new(WorkflowAction::Approve), &reviewer());
        assert_matches!(
            plan_transition(&approved, &TransitionRequest::new(WorkflowAction::Unlock), &reviewer(), Utc::now()),
            Err(CoreError::Forbidden(_))
        );
        let out = plan_transition(&approved, &TransitionRequest::new(WorkflowAction::Unlock), &admin(), Utc::now()).unwrap();
        assert_eq!(out.audit_action, AuditAction::Unlocked);
        assert_eq!(out.next.status, InspectionStatus::InProgress);
        assert!(out.next.can_edit);
        assert!(out.next.locked_at.is_none());
        assert_eq!(out.next.unlocked_by.as_deref(), Some("ada"));
    }

    #[test]
    fn unlocking_an_open_checkpoint_is_invalid() {
        assert_matches!(
            plan_transition(&completed(), &TransitionRequest::new(WorkflowAction::Unlock), &admin(), Utc::now()),
            Err(CoreError::InvalidTransition { .. })
        );
    }

    #[test]
    fn cannot_complete_from_not_started() {
        assert_matches!(
            plan_transition(
                &CheckpointState::default(),
                &TransitionRequest::new(WorkflowAction::Complete),
                &inspector(),
                Utc::now()
            ),
            Err(CoreError::InvalidTransition { .. })
        );
    }

    #[test]
    fn assign_needs_edit_rights_and_an_assignee() {
        let s = step(
            &CheckpointState::default(),
            TransitionRequest::new(WorkflowAction::Assign).with_assignee("mart"),
            &reviewer(),
        );
        assert_eq!(s.assigned_to.as_deref(), Some("mart"));
        assert_eq!(s.status, InspectionStatus::NotStarted);

        assert_matches!(
            plan_transition(&CheckpointState::default(), &TransitionRequest::new(WorkflowAction::Assign), &reviewer(), Utc::now()),
            Err(CoreError::Validation(_))
        );

        let approved = step(&completed(), TransitionRequest::new(WorkflowAction::Approve), &reviewer());
        assert_matches!(
            plan_transition(
                &approved,
                &TransitionRequest::new(WorkflowAction::Assign).with_assignee("mart"),
                &reviewer(),
                Utc::now()
            ),
            Err(CoreError::InvalidTransition { .. })
        );
    }

    #[test]
    fn edit_lock_blocks_non_decisions() {
        let mut state = completed();
        state.can_edit = false;
        assert_matches!(
            plan_transition(&state, &TransitionRequest::new(WorkflowAction::Assign).with_assignee("x"), &reviewer(), Utc::now()),
            Err(CoreError::InvalidTransition { reason: Some(_), .. })
        );
        // Decisions still go through.
        assert!(plan_transition(&state, &TransitionRequest::new(WorkflowAction::Approve), &reviewer(), Utc::now()).is_ok());
    }

    #[test]
    fn auto_start_only_applies_to_not_started() {
        let out = auto_start(&CheckpointState::default(), &inspector(), Utc::now()).unwrap();
        assert_eq!(out.unwrap().next.status, InspectionStatus::InProgress);
        assert!(auto_start(&completed(), &inspector(), Utc::now()).unwrap().is_none());
    }

    #[test]
    fn results_cannot_be_written_to_decided_checkpoints() {
        let approved = step(&completed(), TransitionRequest::new(WorkflowAction::Approve), &reviewer());
        assert!(ensure_result_writable(&approved).is_err());
        assert!(ensure_result_writable(&completed()).is_ok());
    }
}
