use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use sitecheck_core::error::CoreError;
use sitecheck_engine::EngineError;

/// Application-level error type for HTTP handlers.
///
/// Domain and persistence errors arrive through [`EngineError`]; the
/// remaining variants are HTTP-specific. Every variant renders as
/// `{ "error": message, "code": CODE }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The caller did not identify itself.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        Self::Engine(EngineError::Core(err))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Engine(EngineError::Persistence(err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Engine(EngineError::Core(CoreError::Validation(errors.to_string())))
    }
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Engine(EngineError::Core(core)) => core_status(core),
            AppError::Engine(e @ EngineError::Persistence(_)) => {
                if e.is_retryable() {
                    StatusCode::SERVICE_UNAVAILABLE
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Engine(e) => e.code(),
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
        }
    }
}

fn core_status(err: &CoreError) -> StatusCode {
    match err {
        CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::InvalidTransition { .. } | CoreError::Transform(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        CoreError::Conflict(_)
        | CoreError::NotCalibrated { .. }
        | CoreError::DuplicateGuid { .. }
        | CoreError::ConflictingGuid { .. } => StatusCode::CONFLICT,
        CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
        CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "Request failed");
            match status {
                StatusCode::SERVICE_UNAVAILABLE => "Temporarily unavailable, retry later".to_string(),
                _ => "An internal error occurred".to_string(),
            }
        } else {
            match &self {
                AppError::Engine(e) => e.to_string(),
                AppError::BadRequest(msg) | AppError::Unauthorized(msg) => msg.clone(),
            }
        };

        let body = json!({
            "error": message,
            "code": self.code(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitecheck_core::transform::TransformError;

    #[test]
    fn domain_errors_map_to_client_statuses() {
        let cases = [
            (CoreError::not_found("element", 7), StatusCode::NOT_FOUND),
            (CoreError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (CoreError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (
                CoreError::NotCalibrated {
                    project_id: 1,
                    active_points: 1,
                },
                StatusCode::CONFLICT,
            ),
            (
                CoreError::Transform(TransformError::SingularConfiguration {
                    detail: "collinear".into(),
                }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }

    #[test]
    fn unreachable_database_is_service_unavailable() {
        let err = AppError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code(), "PERSISTENCE_FAILURE");
    }
}
