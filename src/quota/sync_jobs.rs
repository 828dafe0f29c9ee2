//! Pausing and resuming an organization's YouTube sync.
//!
//! The organization row carries the sync-wide pause flag and its reason. Each
//! tenant schema holds the individual `youtube_sync_jobs`.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use sqlx::PgPool;
use tracing::info;

use crate::database::models::Model;
use crate::error::TenantError;
use crate::filter::QueryArgs;
use crate::services::tenant_router::TenantQueryRouter;
use crate::types::{Operation, SchemaName};

pub const QUOTA_PAUSE_REASON: &str = "quota_exceeded";

/// Job statuses that are eligible for a quota pause
pub const RUNNABLE_STATUSES: &[&str] = &["pending", "running", "scheduled"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPause {
    Active,
    Paused { reason: Option<String> },
}

#[async_trait]
pub trait SyncJobControl: Send + Sync {
    /// Pause the organization and its runnable jobs for quota exhaustion.
    /// Returns the number of jobs newly paused; already-paused jobs are left alone.
    async fn pause_for_quota(&self, organization_id: &str) -> Result<u64, TenantError>;

    /// Clear the organization pause only when its reason is quota exhaustion
    async fn clear_quota_pause(&self, organization_id: &str) -> Result<bool, TenantError>;

    async fn pause_state(&self, organization_id: &str) -> Result<SyncPause, TenantError>;

    /// Resume jobs paused for quota whose last update is at or after `since`
    async fn resume_quota_paused(&self, organization_id: &str, since: DateTime<Utc>) -> Result<u64, TenantError>;
}

pub struct PgSyncJobControl {
    pool: PgPool,
    organizations: String,
    router: TenantQueryRouter,
}

impl PgSyncJobControl {
    pub fn new(pool: PgPool, shared: &SchemaName, router: TenantQueryRouter) -> Self {
        Self {
            pool,
            organizations: shared.qualify("organizations"),
            router,
        }
    }

    async fn schema(&self, organization_id: &str) -> Result<SchemaName, TenantError> {
        self.router.resolver().resolve(organization_id).await
    }

    async fn update_jobs(&self, schema: &SchemaName, args: QueryArgs) -> Result<u64, TenantError> {
        let output = self
            .router
            .execute_in_schema(schema, Model::YoutubeSyncJob, Operation::Update, &args)
            .await?;
        Ok(output.rows().len() as u64)
    }
}

pub fn pause_jobs_args() -> QueryArgs {
    QueryArgs {
        where_clause: Some(json!({ "status": { "in": RUNNABLE_STATUSES } })),
        data: json!({ "status": "paused", "pause_reason": QUOTA_PAUSE_REASON })
            .as_object()
            .cloned(),
        ..QueryArgs::default()
    }
}

pub fn resume_jobs_args(since: DateTime<Utc>) -> QueryArgs {
    QueryArgs {
        where_clause: Some(json!({
            "status": "paused",
            "pause_reason": QUOTA_PAUSE_REASON,
            "updated_at": { "gte": since.to_rfc3339_opts(SecondsFormat::Micros, true) }
        })),
        data: json!({ "status": "pending", "pause_reason": null }).as_object().cloned(),
        ..QueryArgs::default()
    }
}

#[async_trait]
impl SyncJobControl for PgSyncJobControl {
    async fn pause_for_quota(&self, organization_id: &str) -> Result<u64, TenantError> {
        let sql = format!(
            "UPDATE {} SET \"youtube_sync_paused\" = TRUE, \
             \"youtube_sync_pause_reason\" = COALESCE(\"youtube_sync_pause_reason\", $2), \
             \"youtube_sync_paused_at\" = COALESCE(\"youtube_sync_paused_at\", NOW()) \
             WHERE \"id\" = $1",
            self.organizations
        );
        sqlx::query(&sql)
            .bind(organization_id)
            .bind(QUOTA_PAUSE_REASON)
            .execute(&self.pool)
            .await
            .map_err(|e| TenantError::store("pausing organization sync", e))?;

        let schema = self.schema(organization_id).await?;
        let paused = self.update_jobs(&schema, pause_jobs_args()).await?;
        info!(organization_id, paused, "Paused YouTube sync jobs for quota");
        Ok(paused)
    }

    async fn clear_quota_pause(&self, organization_id: &str) -> Result<bool, TenantError> {
        let sql = format!(
            "UPDATE {} SET \"youtube_sync_paused\" = FALSE, \"youtube_sync_pause_reason\" = NULL, \"youtube_sync_paused_at\" = NULL \
             WHERE \"id\" = $1 AND \"youtube_sync_paused\" AND \"youtube_sync_pause_reason\" = $2",
            self.organizations
        );
        let result = sqlx::query(&sql)
            .bind(organization_id)
            .bind(QUOTA_PAUSE_REASON)
            .execute(&self.pool)
            .await
            .map_err(|e| TenantError::store("clearing organization sync pause", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn pause_state(&self, organization_id: &str) -> Result<SyncPause, TenantError> {
        let sql = format!(
            "SELECT \"youtube_sync_paused\", \"youtube_sync_pause_reason\" FROM {} WHERE \"id\" = $1",
            self.organizations
        );
        let row: Option<(bool, Option<String>)> = sqlx::query_as(&sql)
            .bind(organization_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| TenantError::store("reading organization sync pause", e))?;

        match row {
            None => Err(TenantError::not_found(format!("organization '{}'", organization_id))),
            Some((false, _)) => Ok(SyncPause::Active),
            Some((true, reason)) => Ok(SyncPause::Paused { reason }),
        }
    }

    async fn resume_quota_paused(&self, organization_id: &str, since: DateTime<Utc>) -> Result<u64, TenantError> {
        let schema = self.schema(organization_id).await?;
        let resumed = self.update_jobs(&schema, resume_jobs_args(since)).await?;
        info!(organization_id, resumed, "Resumed YouTube sync jobs after quota reset");
        Ok(resumed)
    }
}
