use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Service-level error type shared across the realtime core.
///
/// Variants map onto the error taxonomy of the realtime protocol:
/// authorization failures, recoverable conflicts, validation failures,
/// degraded downstreams and fatal store errors.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Downstream unavailable: {0}")]
    Downstream(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::NotFound(_) => 404,
            ServiceError::Unauthorized => 401,
            ServiceError::Forbidden(_) => 403,
            ServiceError::Validation(_) => 400,
            ServiceError::Conflict(_) => 409,
            ServiceError::Downstream(_) => 503,
            ServiceError::Database(_) | ServiceError::Internal(_) => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Unauthorized => "UNAUTHORIZED",
            ServiceError::Forbidden(_) => "FORBIDDEN",
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::Conflict(_) => "CONFLICT",
            ServiceError::Downstream(_) => "SERVICE_UNAVAILABLE",
            ServiceError::Database(_) => "DATABASE_ERROR",
            ServiceError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            status: self.status_code(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ServiceError::NotFound("row not found".into()),
            other => ServiceError::Database(other.to_string()),
        }
    }
}

/// Wire format for error payloads returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable machine-readable code (e.g. "FORBIDDEN", "VALIDATION_ERROR")
    pub code: String,
    /// Human-readable description
    pub message: String,
    /// HTTP status code equivalent
    pub status: u16,
    /// RFC 3339 timestamp of when the error was produced
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(ServiceError::Unauthorized.status_code(), 401);
        assert_eq!(ServiceError::Forbidden("banned".into()).status_code(), 403);
        assert_eq!(ServiceError::Validation("empty".into()).status_code(), 400);
        assert_eq!(ServiceError::Conflict("dup".into()).status_code(), 409);
        assert_eq!(ServiceError::Downstream("redis".into()).status_code(), 503);
        assert_eq!(ServiceError::Database("boom".into()).status_code(), 500);
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: ServiceError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[test]
    fn response_carries_code_and_message() {
        let resp = ServiceError::Forbidden("not a participant".into()).to_response();
        assert_eq!(resp.code, "FORBIDDEN");
        assert!(resp.message.contains("not a participant"));
        assert_eq!(resp.status, 403);
    }
}
