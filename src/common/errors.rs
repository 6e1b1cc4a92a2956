use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde_json::json;
use std::fmt;

/// Custom error types for business logic validation and application errors
#[derive(Debug, Clone)]
pub enum BusinessError {
    /// Validation errors for user input (400 Bad Request)
    ValidationError { field: String, message: String },
    /// Business rule violations (400 Bad Request)
    BusinessRuleViolation { rule: String, message: String },
    /// Resource not found (404 Not Found)
    NotFound { resource: String, id: String },
    /// Duplicate resource (409 Conflict)
    Duplicate { resource: String, field: String },
    /// External service errors (502 Bad Gateway)
    ExternalServiceError { service: String, message: String },
    /// Generic application error (500 Internal Server Error)
    InternalError { message: String },
}

impl BusinessError {
    pub fn not_found(resource: &str, id: impl fmt::Display) -> Self {
        BusinessError::NotFound {
            resource: resource.to_string(),
            id: id.to_string(),
        }
    }

    pub fn rule(rule: &str, message: impl Into<String>) -> Self {
        BusinessError::BusinessRuleViolation {
            rule: rule.to_string(),
            message: message.into(),
        }
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        BusinessError::ValidationError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for BusinessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusinessError::ValidationError { field, message } => {
                write!(f, "Validation error in field '{field}': {message}")
            }
            BusinessError::BusinessRuleViolation { rule, message } => {
                write!(f, "Business rule '{rule}' violated: {message}")
            }
            BusinessError::NotFound { resource, id } => {
                write!(f, "{resource} with id '{id}' not found")
            }
            BusinessError::Duplicate { resource, field } => {
                write!(f, "{resource} with this {field} already exists")
            }
            BusinessError::ExternalServiceError { service, message } => {
                write!(f, "External service '{service}' error: {message}")
            }
            BusinessError::InternalError { message } => {
                write!(f, "Internal error: {message}")
            }
        }
    }
}

impl std::error::Error for BusinessError {}

/// Convert `BusinessError` to HTTP responses
impl IntoResponse for BusinessError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            BusinessError::ValidationError { .. } => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            BusinessError::BusinessRuleViolation { .. } => {
                (StatusCode::BAD_REQUEST, "BUSINESS_RULE_VIOLATION")
            }
            BusinessError::NotFound { .. } => (StatusCode::NOT_FOUND, "RESOURCE_NOT_FOUND"),
            BusinessError::Duplicate { .. } => (StatusCode::CONFLICT, "DUPLICATE_RESOURCE"),
            BusinessError::ExternalServiceError { .. } => {
                (StatusCode::BAD_GATEWAY, "EXTERNAL_SERVICE_ERROR")
            }
            BusinessError::InternalError { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

impl From<DbErr> for BusinessError {
    fn from(err: DbErr) -> Self {
        match err {
            DbErr::RecordNotFound(msg) => BusinessError::NotFound {
                resource: "record".to_string(),
                id: msg,
            },
            other => BusinessError::InternalError {
                message: other.to_string(),
            },
        }
    }
}

/// Detect a unique-index violation so callers can retry or report Conflict.
///
/// Postgres reports `duplicate key value violates unique constraint`,
/// SQLite reports `UNIQUE constraint failed`.
pub fn is_unique_violation(err: &DbErr) -> bool {
    let msg = err.to_string();
    msg.contains("UNIQUE constraint") || msg.contains("duplicate key")
}

/// Result type alias for business operations
pub type BusinessResult<T> = Result<T, BusinessError>;
