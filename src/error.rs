//! Error taxonomy for the tenant isolation layer and the quota ledger.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::database::models::Model;
use crate::filter::error::FilterError;
use crate::types::Operation;

#[derive(Debug, Error)]
pub enum TenantError {
    /// Unknown organization or schema
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unknown model, column or operation. Programmer error, never user-triggered.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A value supplied for a known column has the wrong shape
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Cross-tenant access denied
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Underlying store failure while running a built statement
    #[error("Query error on {model}.{operation}: {source}")]
    Query {
        model: Model,
        operation: Operation,
        #[source]
        source: sqlx::Error,
    },

    /// Store failure in the shared namespace (registry, audit log, quota tables)
    #[error("Store error while {context}: {source}")]
    Store {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Version conflict on {model}: expected version {expected}")]
    VersionConflict { model: Model, expected: i64 },

    #[error("Quota exceeded for organization {organization_id}: {current_usage}/{limit} units used, resets at {reset_at}")]
    QuotaExceeded {
        organization_id: String,
        current_usage: i64,
        limit: i64,
        reset_at: DateTime<Utc>,
    },
}

impl TenantError {
    pub fn not_found(message: impl Into<String>) -> Self {
        TenantError::NotFound(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        TenantError::Configuration(message.into())
    }

    pub fn invalid_value(message: impl Into<String>) -> Self {
        TenantError::InvalidValue(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        TenantError::Unauthorized(message.into())
    }

    pub fn store(context: impl Into<String>, source: sqlx::Error) -> Self {
        TenantError::Store { context: context.into(), source }
    }

    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, TenantError::QuotaExceeded { .. })
    }
}

impl From<FilterError> for TenantError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::InvalidValue(msg) => TenantError::InvalidValue(msg),
            FilterError::JsonError(e) => TenantError::InvalidValue(e.to_string()),
            other => TenantError::Configuration(other.to_string()),
        }
    }
}

/// Failure of a quota-guarded external call
#[derive(Debug, Error)]
pub enum ExecuteError<E>
where
    E: std::error::Error + 'static,
{
    #[error(transparent)]
    Quota(#[from] TenantError),

    #[error("external call failed: {0}")]
    Call(#[source] E),
}

pub type Result<T, E = TenantError> = std::result::Result<T, E>;
