use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{error, info, warn};

use crate::error::TenantError;
use crate::types::SchemaName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub organization_id: String,
    pub severity: Severity,
    pub kind: String,
    pub title: String,
    pub message: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), TenantError>;
}

/// Writes notifications to the log only
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, n: Notification) -> Result<(), TenantError> {
        match n.severity {
            Severity::Info => info!(organization_id = %n.organization_id, kind = %n.kind, "{}: {}", n.title, n.message),
            Severity::Warning => warn!(organization_id = %n.organization_id, kind = %n.kind, "{}: {}", n.title, n.message),
            Severity::Error => error!(organization_id = %n.organization_id, kind = %n.kind, "{}: {}", n.title, n.message),
        }
        Ok(())
    }
}

/// Persists notifications to the shared `notifications` table
pub struct PgNotifier {
    pool: PgPool,
    table: String,
}

impl PgNotifier {
    pub fn new(pool: PgPool, shared: &SchemaName) -> Self {
        Self {
            pool,
            table: shared.qualify("notifications"),
        }
    }
}

#[async_trait]
impl Notifier for PgNotifier {
    async fn notify(&self, n: Notification) -> Result<(), TenantError> {
        let sql = format!(
            "INSERT INTO {} (\"organization_id\", \"severity\", \"kind\", \"title\", \"message\") VALUES ($1, $2, $3, $4, $5)",
            self.table
        );
        sqlx::query(&sql)
            .bind(&n.organization_id)
            .bind(n.severity.as_str())
            .bind(&n.kind)
            .bind(&n.title)
            .bind(&n.message)
            .execute(&self.pool)
            .await
            .map_err(|e| TenantError::store("writing notification", e))?;
        LogNotifier.notify(n).await
    }
}
