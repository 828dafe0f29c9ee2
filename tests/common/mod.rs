#![allow(dead_code)]

use std::sync::Arc;

use adops_tenancy::config::QuotaSettings;
use adops_tenancy::database::query_builder::QueryBuilder;
use adops_tenancy::quota::ledger::QuotaLedger;
use adops_tenancy::services::{AccessValidator, SchemaResolver, TenantContext, TenantQueryRouter, UserRole};
use adops_tenancy::testing::*;
use adops_tenancy::types::SchemaName;
use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

/// Everything wired over in-memory stores
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub directory: Arc<MemoryDirectory>,
    pub audit: Arc<MemoryAuditLog>,
    pub store: Arc<MemoryQuotaStore>,
    pub sync_jobs: Arc<MemorySyncJobs>,
    pub notifier: Arc<RecordingNotifier>,
    pub executor: Arc<RecordingExecutor>,
    pub validator: AccessValidator,
    pub router: TenantQueryRouter,
    pub ledger: Arc<QuotaLedger>,
}

/// Noon UTC on a fixed day
pub fn start_of_test() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(QuotaSettings::default())
    }

    pub fn with_settings(settings: QuotaSettings) -> Self {
        let clock = Arc::new(ManualClock::new(start_of_test()));
        let directory = Arc::new(MemoryDirectory::new());
        let audit = Arc::new(MemoryAuditLog::new());
        let store = Arc::new(MemoryQuotaStore::new());
        let sync_jobs = Arc::new(MemorySyncJobs::new(clock.clone()));
        let notifier = Arc::new(RecordingNotifier::new());
        let executor = Arc::new(RecordingExecutor::new());

        let validator = AccessValidator::new(audit.clone());
        let router = TenantQueryRouter::new(
            SchemaResolver::new(directory.clone(), "org_"),
            validator.clone(),
            QueryBuilder::default(),
            executor.clone(),
        );
        let ledger = Arc::new(QuotaLedger::new(
            store.clone(),
            directory.clone(),
            sync_jobs.clone(),
            notifier.clone(),
            clock.clone(),
            settings,
        ));

        Self {
            clock,
            directory,
            audit,
            store,
            sync_jobs,
            notifier,
            executor,
            validator,
            router,
            ledger,
        }
    }

    pub fn organization(&self, id: &str, slug: &str, timezone: Tz) {
        self.directory.insert(id, slug, timezone);
    }

    /// Today's date for an organization on the harness clock
    pub fn today(&self, timezone: Tz) -> chrono::NaiveDate {
        adops_tenancy::quota::ledger::local_date(timezone, adops_tenancy::quota::Clock::now(self.clock.as_ref()))
    }
}

pub fn context(organization_id: &str, slug: &str, role: UserRole) -> TenantContext {
    let schema = SchemaName::new(format!("org_{}", slug.replace('-', "_"))).unwrap();
    TenantContext::new(format!("user-{}", organization_id), organization_id, slug, schema, role)
}

/// A throwaway schema in the database named by `TEST_DATABASE_URL`.
/// `None` when the variable is unset, so database tests skip.
pub struct TestDatabase {
    pub pool: PgPool,
    pub shared: SchemaName,
    pub tenant: SchemaName,
}

impl TestDatabase {
    pub async fn connect() -> Result<Option<Self>> {
        let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set; skipping database test");
            return Ok(None);
        };
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(&url)
            .await
            .context("connecting to TEST_DATABASE_URL")?;

        let suffix = Uuid::new_v4().simple().to_string();
        let shared = SchemaName::new(format!("test_shared_{}", &suffix[..12]))?;
        let tenant = SchemaName::new(format!("test_org_{}", &suffix[..12]))?;

        adops_tenancy::database::schema::bootstrap_shared_schema(&pool, &shared).await?;
        adops_tenancy::database::schema::provision_tenant_schema(&pool, &tenant).await?;

        Ok(Some(Self { pool, shared, tenant }))
    }

    pub async fn cleanup(self) -> Result<()> {
        for schema in [&self.shared, &self.tenant] {
            sqlx::query(&format!("DROP SCHEMA IF EXISTS \"{}\" CASCADE", schema))
                .execute(&self.pool)
                .await?;
        }
        self.pool.close().await;
        Ok(())
    }
}
