use crate::transform::TransformError;
use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// Fewer than two active calibration points exist for a local project.
    /// This is an expected state, not a fault.
    #[error("Project {project_id} is not calibrated ({active_points} active points, at least 2 required)")]
    NotCalibrated { project_id: DbId, active_points: usize },

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error("GUID '{guid}' is already used by element {existing_id} in project {project_id}")]
    DuplicateGuid {
        project_id: DbId,
        guid: String,
        existing_id: DbId,
    },

    #[error("Cannot remap to GUID '{guid}': held by element {holder_id} in project {project_id}")]
    ConflictingGuid {
        project_id: DbId,
        guid: String,
        holder_id: DbId,
    },

    #[error("Invalid transition: cannot {action} a checkpoint in status '{from}'{suffix}", suffix = reason_suffix(.reason))]
    InvalidTransition {
        from: String,
        action: String,
        reason: Option<String>,
    },
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(r) => format!(" ({r})"),
        None => String::new(),
    }
}

impl CoreError {
    /// Shorthand for a `NotFound` keyed by a numeric id.
    pub fn not_found(entity: &'static str, id: DbId) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether retrying the same request could succeed without new input.
    ///
    /// Every domain error requires the caller to change something first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Internal(_))
    }

    /// Stable machine-readable code for API responses and per-item bulk results.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::NotCalibrated { .. } => "NOT_CALIBRATED",
            Self::Transform(t) => t.code(),
            Self::DuplicateGuid { .. } => "DUPLICATE_GUID",
            Self::ConflictingGuid { .. } => "CONFLICTING_GUID",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_message_includes_reason() {
        let err = CoreError::InvalidTransition {
            from: "approved".into(),
            action: "complete".into(),
            reason: Some("checkpoint is locked".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("approved"));
        assert!(msg.contains("checkpoint is locked"));
    }

    #[test]
    fn invalid_transition_message_without_reason() {
        let err = CoreError::InvalidTransition {
            from: "not_started".into(),
            action: "approve".into(),
            reason: None,
        };
        assert!(err.to_string().ends_with("'not_started'"));
    }

    #[test]
    fn domain_errors_are_not_retryable() {
        assert!(!CoreError::Validation("x".into()).is_retryable());
        assert!(!CoreError::NotCalibrated {
            project_id: 1,
            active_points: 0
        }
        .is_retryable());
        assert!(CoreError::Internal("boom".into()).is_retryable());
    }

    #[test]
    fn transform_errors_keep_their_code() {
        let err = CoreError::from(TransformError::InsufficientPoints { found: 1 });
        assert_eq!(err.code(), "INSUFFICIENT_POINTS");
    }
}
