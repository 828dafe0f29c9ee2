//! Append-only log of cross-tenant access attempts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::TenantError;
use crate::services::context::UserRole;
use crate::types::SchemaName;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantAccessLogEntry {
    pub user_id: String,
    pub user_role: UserRole,
    pub accessed_org_id: String,
    pub accessed_schema: Option<String>,
    pub operation: Option<String>,
    pub model: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub allowed: bool,
    pub reason: Option<String>,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: &TenantAccessLogEntry) -> Result<(), TenantError>;

    /// Newest first, optionally restricted to one accessed organization
    async fn recent(
        &self,
        organization_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<TenantAccessLogEntry>, TenantError>;
}

pub struct PgAuditLog {
    pool: PgPool,
    table: String,
}

type AuditRow = (
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    DateTime<Utc>,
    bool,
    Option<String>,
);

impl PgAuditLog {
    pub fn new(pool: PgPool, shared: &SchemaName) -> Self {
        Self {
            pool,
            table: shared.qualify("tenant_access_logs"),
        }
    }
}

#[async_trait]
impl AuditSink for PgAuditLog {
    async fn record(&self, entry: &TenantAccessLogEntry) -> Result<(), TenantError> {
        let sql = format!(
            "INSERT INTO {} (\"user_id\", \"user_role\", \"accessed_org_id\", \"accessed_schema\", \"operation\", \"model\", \"timestamp\", \"allowed\", \"reason\") \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            self.table
        );
        sqlx::query(&sql)
            .bind(&entry.user_id)
            .bind(entry.user_role.as_str())
            .bind(&entry.accessed_org_id)
            .bind(&entry.accessed_schema)
            .bind(&entry.operation)
            .bind(&entry.model)
            .bind(entry.timestamp)
            .bind(entry.allowed)
            .bind(&entry.reason)
            .execute(&self.pool)
            .await
            .map_err(|e| TenantError::store("writing tenant access log", e))?;
        Ok(())
    }

    async fn recent(
        &self,
        organization_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<TenantAccessLogEntry>, TenantError> {
        let sql = format!(
            "SELECT \"user_id\", \"user_role\", \"accessed_org_id\", \"accessed_schema\", \"operation\", \"model\", \"timestamp\", \"allowed\", \"reason\" \
             FROM {} WHERE ($1::TEXT IS NULL OR \"accessed_org_id\" = $1) ORDER BY \"timestamp\" DESC, \"id\" DESC LIMIT $2",
            self.table
        );
        let rows: Vec<AuditRow> = sqlx::query_as(&sql)
            .bind(organization_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TenantError::store("reading tenant access log", e))?;

        rows.into_iter()
            .map(|(user_id, role, accessed_org_id, accessed_schema, operation, model, timestamp, allowed, reason)| {
                Ok(TenantAccessLogEntry {
                    user_id,
                    user_role: role.parse()?,
                    accessed_org_id,
                    accessed_schema,
                    operation,
                    model,
                    timestamp,
                    allowed,
                    reason,
                })
            })
            .collect()
    }
}
