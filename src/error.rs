//! Structured error types for API responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Client errors
    ValidationFailed,
    InvalidFilterValue,

    // Not found errors
    EntityNotFound,
    ReferenceNotFound,

    // Auth errors
    Unauthorized,
    Forbidden,

    // Conflict errors
    AlreadyExists,
    InUse,

    // Internal errors
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    /// HTTP status this code is reported with.
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::ValidationFailed | ErrorCode::InvalidFilterValue => StatusCode::BAD_REQUEST,
            ErrorCode::EntityNotFound | ErrorCode::ReferenceNotFound => StatusCode::NOT_FOUND,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::AlreadyExists | ErrorCode::InUse => StatusCode::CONFLICT,
            ErrorCode::DatabaseError | ErrorCode::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Structured error for API responses.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            details: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn validation(field: &str, reason: &str) -> Self {
        Self::new(ErrorCode::ValidationFailed, reason).with_field(field)
    }

    pub fn required(field: &str) -> Self {
        Self::validation(field, &format!("{} is required", field))
    }

    pub fn invalid_filter(param: &str, value: &str) -> Self {
        Self::new(
            ErrorCode::InvalidFilterValue,
            format!("Invalid value for filter '{}': {:?}", param, value),
        )
        .with_field(param)
    }

    pub fn entity_not_found(kind: &str, id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::EntityNotFound,
            format!("{} with id {} not found", kind, id),
        )
    }

    pub fn reference_not_found(field: &str, kind: &str, key: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::ReferenceNotFound,
            format!("Referenced {} not found: {}", kind, key),
        )
        .with_field(field)
    }

    pub fn unauthorized(reason: &str) -> Self {
        Self::new(ErrorCode::Unauthorized, reason)
    }

    pub fn forbidden(reason: &str) -> Self {
        Self::new(ErrorCode::Forbidden, reason)
    }

    pub fn already_exists(field: &str, value: &str) -> Self {
        Self::new(
            ErrorCode::AlreadyExists,
            format!("{} '{}' is already taken", field, value),
        )
        .with_field(field)
    }

    pub fn in_use(kind: &str, id: i64) -> Self {
        Self::new(
            ErrorCode::InUse,
            format!("{} {} is still referenced by tasks", kind, id),
        )
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        // Typed errors raised inside the db layer travel through anyhow
        match err.downcast::<ApiError>() {
            Ok(api_err) => api_err,
            Err(err) => match err.downcast::<rusqlite::Error>() {
                Ok(sql_err) => ApiError::database(sql_err),
                Err(err) => ApiError::internal(err),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.code.status();
        if status.is_server_error() {
            tracing::error!(code = ?self.code, "{}", self.message);
        } else {
            tracing::debug!(code = ?self.code, "{}", self.message);
        }
        (status, Json(self)).into_response()
    }
}

/// Result type for API operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorCode::ValidationFailed.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::InvalidFilterValue.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::EntityNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::ReferenceNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::InUse.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = ApiError::entity_not_found("Task", 3).into();
        let api: ApiError = err.into();
        assert_eq!(api.code, ErrorCode::EntityNotFound);

        let err = anyhow::anyhow!("boom");
        let api: ApiError = err.into();
        assert_eq!(api.code, ErrorCode::InternalError);
    }

    #[test]
    fn test_serializes_code_and_field() {
        let err = ApiError::reference_not_found("assignee_id", "user", 9);
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v["code"], "REFERENCE_NOT_FOUND");
        assert_eq!(v["field"], "assignee_id");
        assert!(v.get("details").is_none());
    }
}
