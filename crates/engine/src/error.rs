use sitecheck_core::bulk::ErrorCode;
use sitecheck_core::error::CoreError;
use sitecheck_core::transform::TransformError;

/// Postgres SQLSTATE for a serialization failure under concurrent writers.
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
/// Raised when `lock_timeout` expires while waiting for a row lock.
const LOCK_NOT_AVAILABLE: &str = "55P03";
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Errors returned by engine operations.
///
/// Domain outcomes are carried unchanged in `Core`; anything the database
/// reported is a `Persistence` failure the caller may retry.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Persistence failure: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl From<TransformError> for EngineError {
    fn from(err: TransformError) -> Self {
        Self::Core(CoreError::Transform(err))
    }
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Core(e) => e.code(),
            Self::Persistence(_) => "PERSISTENCE_FAILURE",
        }
    }

    /// Whether the same request may succeed later without changes.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Core(e) => e.is_retryable(),
            Self::Persistence(sqlx::Error::Database(db)) => matches!(
                db.code().as_deref(),
                Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) | Some(LOCK_NOT_AVAILABLE)
            ),
            Self::Persistence(_) => true,
        }
    }

    /// The domain error, if this is one.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            Self::Core(e) => Some(e),
            Self::Persistence(_) => None,
        }
    }
}

impl ErrorCode for EngineError {
    fn code(&self) -> &'static str {
        EngineError::code(self)
    }
}

/// Whether `err` is a unique violation of the named constraint.
pub(crate) fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.code().as_deref() == Some(UNIQUE_VIOLATION) && db.constraint() == Some(constraint)
        }
        _ => false,
    }
}

/// Whether `err` is a foreign key violation, e.g. an unknown project id.
pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_codes_pass_through() {
        let err = EngineError::from(CoreError::Validation("bad".into()));
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(!err.is_retryable());
    }

    #[test]
    fn connection_level_failures_are_retryable() {
        let err = EngineError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.code(), "PERSISTENCE_FAILURE");
        assert!(err.is_retryable());
    }

    #[test]
    fn transform_errors_become_core_errors() {
        let err = EngineError::from(TransformError::InsufficientPoints { found: 1 });
        assert_eq!(err.code(), "INSUFFICIENT_POINTS");
        assert!(err.as_core().is_some());
    }
}
