// HTTP API error types
use axum::{http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::error::TenantError;

/// HTTP API error with a status code and a client-safe message
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 429 Too Many Requests
    QuotaExceeded {
        message: String,
        current_usage: i64,
        limit: i64,
        reset_at: DateTime<Utc>,
    },

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::QuotaExceeded { .. } => 429,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::ValidationError(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::InternalServerError(msg)
            | ApiError::ServiceUnavailable(msg) => msg,
            ApiError::QuotaExceeded { message, .. } => message,
        }
    }

    /// Error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "success": false,
            "error": self.message(),
            "code": self.error_code()
        });
        if let ApiError::QuotaExceeded { current_usage, limit, reset_at, .. } = self {
            body["data"] = json!({
                "currentUsage": current_usage,
                "limit": limit,
                "resetAt": reset_at
            });
        }
        body
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }
}

impl From<TenantError> for ApiError {
    fn from(err: TenantError) -> Self {
        match err {
            TenantError::NotFound(msg) => ApiError::NotFound(format!("Not found: {}", msg)),
            TenantError::Configuration(msg) => ApiError::BadRequest(msg),
            TenantError::InvalidValue(msg) => ApiError::ValidationError(msg),
            TenantError::Unauthorized(msg) => ApiError::Forbidden(msg),
            e @ TenantError::VersionConflict { .. } => ApiError::Conflict(e.to_string()),
            TenantError::QuotaExceeded { organization_id, current_usage, limit, reset_at } => ApiError::QuotaExceeded {
                message: format!(
                    "YouTube quota exhausted for {}: {}/{} units used",
                    organization_id, current_usage, limit
                ),
                current_usage,
                limit,
                reset_at,
            },
            TenantError::Query { model, operation, source } => {
                // Don't expose SQL errors to clients
                tracing::error!(model = %model, operation = %operation, "Query error: {}", source);
                ApiError::internal_server_error("An error occurred while processing your request")
            }
            TenantError::Store { context, source } => {
                tracing::error!("Store error while {}: {}", context, source);
                if matches!(source, sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed) {
                    ApiError::ServiceUnavailable("Database temporarily unavailable".to_string())
                } else {
                    ApiError::internal_server_error("Database error occurred")
                }
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn quota_exceeded_maps_to_429_with_details() {
        let reset_at = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let err: ApiError = TenantError::QuotaExceeded {
            organization_id: "org-1".into(),
            current_usage: 9950,
            limit: 10_000,
            reset_at,
        }
        .into();
        assert_eq!(err.status_code(), 429);
        let body = err.to_json();
        assert_eq!(body["code"], "QUOTA_EXCEEDED");
        assert_eq!(body["data"]["currentUsage"], 9950);
        assert_eq!(body["data"]["limit"], 10_000);
    }

    #[test]
    fn store_errors_are_not_leaked() {
        let err: ApiError = TenantError::store("reading quota usage", sqlx::Error::RowNotFound).into();
        assert_eq!(err.status_code(), 500);
        assert!(!err.message().contains("quota"));
    }

    #[test]
    fn cross_tenant_denial_is_forbidden() {
        let err: ApiError = TenantError::unauthorized("unauthorized cross-tenant access").into();
        assert_eq!(err.status_code(), 403);
    }
}
