//! Durable quota counters and per-organization quota configuration.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;

use crate::error::TenantError;
use crate::quota::types::QuotaConfig;
use crate::types::SchemaName;

#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn config(&self, organization_id: &str) -> Result<Option<QuotaConfig>, TenantError>;

    async fn save_config(&self, config: &QuotaConfig) -> Result<(), TenantError>;

    /// Units used on `date`; zero when no row exists yet
    async fn usage(&self, organization_id: &str, date: NaiveDate) -> Result<i64, TenantError>;

    /// Atomically add `cost` to the day's counter, creating the row on first
    /// use, and return the new total
    async fn increment(&self, organization_id: &str, date: NaiveDate, cost: i64) -> Result<i64, TenantError>;

    /// Create the zero row for `date` if it does not exist yet and return the
    /// day's usage. Existing usage is left as is.
    async fn open_day(&self, organization_id: &str, date: NaiveDate) -> Result<i64, TenantError>;

    /// Start `date` from zero
    async fn reset(&self, organization_id: &str, date: NaiveDate) -> Result<(), TenantError>;
}

pub struct PgQuotaStore {
    pool: PgPool,
    usage_table: String,
    config_table: String,
}

impl PgQuotaStore {
    pub fn new(pool: PgPool, shared: &SchemaName) -> Self {
        Self {
            pool,
            usage_table: shared.qualify("youtube_quota_usage"),
            config_table: shared.qualify("youtube_quota_configs"),
        }
    }
}

#[async_trait]
impl QuotaStore for PgQuotaStore {
    async fn config(&self, organization_id: &str) -> Result<Option<QuotaConfig>, TenantError> {
        let sql = format!(
            "SELECT \"organization_id\", \"daily_limit\", \"api_key\", \"oauth_client_id\", \"oauth_client_secret\" FROM {} WHERE \"organization_id\" = $1",
            self.config_table
        );
        let row: Option<(String, i64, Option<String>, Option<String>, Option<String>)> = sqlx::query_as(&sql)
            .bind(organization_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| TenantError::store("loading quota config", e))?;

        Ok(row.map(
            |(organization_id, daily_limit, api_key, oauth_client_id, oauth_client_secret)| QuotaConfig {
                organization_id,
                daily_limit,
                api_key,
                oauth_client_id,
                oauth_client_secret,
            },
        ))
    }

    async fn save_config(&self, config: &QuotaConfig) -> Result<(), TenantError> {
        let sql = format!(
            "INSERT INTO {} (\"organization_id\", \"daily_limit\", \"api_key\", \"oauth_client_id\", \"oauth_client_secret\") \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (\"organization_id\") DO UPDATE SET \
             \"daily_limit\" = EXCLUDED.\"daily_limit\", \"api_key\" = EXCLUDED.\"api_key\", \
             \"oauth_client_id\" = EXCLUDED.\"oauth_client_id\", \"oauth_client_secret\" = EXCLUDED.\"oauth_client_secret\", \
             \"updated_at\" = NOW()",
            self.config_table
        );
        sqlx::query(&sql)
            .bind(&config.organization_id)
            .bind(config.daily_limit)
            .bind(&config.api_key)
            .bind(&config.oauth_client_id)
            .bind(&config.oauth_client_secret)
            .execute(&self.pool)
            .await
            .map_err(|e| TenantError::store("saving quota config", e))?;
        Ok(())
    }

    async fn usage(&self, organization_id: &str, date: NaiveDate) -> Result<i64, TenantError> {
        let sql = format!(
            "SELECT \"used_units\" FROM {} WHERE \"organization_id\" = $1 AND \"usage_date\" = $2",
            self.usage_table
        );
        let row: Option<(i64,)> = sqlx::query_as(&sql)
            .bind(organization_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| TenantError::store("reading quota usage", e))?;
        Ok(row.map(|(used,)| used).unwrap_or(0))
    }

    async fn increment(&self, organization_id: &str, date: NaiveDate, cost: i64) -> Result<i64, TenantError> {
        let sql = format!(
            "INSERT INTO {table} (\"organization_id\", \"usage_date\", \"used_units\") VALUES ($1, $2, $3) \
             ON CONFLICT (\"organization_id\", \"usage_date\") DO UPDATE SET \
             \"used_units\" = {table}.\"used_units\" + EXCLUDED.\"used_units\", \"updated_at\" = NOW() \
             RETURNING \"used_units\"",
            table = self.usage_table
        );
        let (used,): (i64,) = sqlx::query_as(&sql)
            .bind(organization_id)
            .bind(date)
            .bind(cost)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| TenantError::store("recording quota usage", e))?;
        Ok(used)
    }

    async fn open_day(&self, organization_id: &str, date: NaiveDate) -> Result<i64, TenantError> {
        // No-op update so the existing counter comes back in the same round trip
        let sql = format!(
            "INSERT INTO {table} (\"organization_id\", \"usage_date\", \"used_units\") VALUES ($1, $2, 0) \
             ON CONFLICT (\"organization_id\", \"usage_date\") DO UPDATE SET \
             \"used_units\" = {table}.\"used_units\" \
             RETURNING \"used_units\"",
            table = self.usage_table
        );
        let (used,): (i64,) = sqlx::query_as(&sql)
            .bind(organization_id)
            .bind(date)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| TenantError::store("opening quota day", e))?;
        Ok(used)
    }

    async fn reset(&self, organization_id: &str, date: NaiveDate) -> Result<(), TenantError> {
        let sql = format!(
            "INSERT INTO {} (\"organization_id\", \"usage_date\", \"used_units\") VALUES ($1, $2, 0) \
             ON CONFLICT (\"organization_id\", \"usage_date\") DO UPDATE SET \"used_units\" = 0, \"updated_at\" = NOW()",
            self.usage_table
        );
        sqlx::query(&sql)
            .bind(organization_id)
            .bind(date)
            .execute(&self.pool)
            .await
            .map_err(|e| TenantError::store("resetting quota usage", e))?;
        Ok(())
    }
}
