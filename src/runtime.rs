//! Wires the Postgres-backed services together from configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::api::AppState;
use crate::config::AppConfig;
use crate::database::executor::PgExecutor;
use crate::database::manager::DatabaseManager;
use crate::database::query_builder::QueryBuilder;
use crate::error::TenantError;
use crate::filter::FilterOptions;
use crate::quota::clock::{Clock, SystemClock};
use crate::quota::ledger::QuotaLedger;
use crate::quota::notifier::PgNotifier;
use crate::quota::scheduler::QuotaResetScheduler;
use crate::quota::store::PgQuotaStore;
use crate::quota::sync_jobs::PgSyncJobControl;
use crate::services::access_validator::AccessValidator;
use crate::services::audit_log::{AuditSink, PgAuditLog};
use crate::services::schema_resolver::{OrganizationDirectory, PgOrganizationDirectory, SchemaResolver};
use crate::services::tenant_router::TenantQueryRouter;
use crate::types::SchemaName;

#[derive(Clone)]
pub struct Services {
    pub database: DatabaseManager,
    pub shared_schema: SchemaName,
    pub directory: Arc<dyn OrganizationDirectory>,
    pub audit: Arc<dyn AuditSink>,
    pub validator: AccessValidator,
    pub router: TenantQueryRouter,
    pub ledger: Arc<QuotaLedger>,
    pub clock: Arc<dyn Clock>,
    reset_tick: Duration,
}

impl Services {
    pub fn new(database: DatabaseManager, config: &AppConfig) -> Result<Self, TenantError> {
        let pool = database.pool().clone();
        let shared_schema = SchemaName::new(config.tenancy.shared_schema.clone())?;

        let directory: Arc<dyn OrganizationDirectory> =
            Arc::new(PgOrganizationDirectory::new(pool.clone(), &shared_schema));
        let audit: Arc<dyn AuditSink> = Arc::new(PgAuditLog::new(pool.clone(), &shared_schema));
        let resolver = SchemaResolver::new(directory.clone(), config.tenancy.schema_prefix.clone());
        let validator = AccessValidator::new(audit.clone());
        let executor = PgExecutor::new(pool.clone()).with_logging(
            config.database.enable_query_logging,
            config.database.slow_query_threshold_ms,
        );
        let builder = QueryBuilder::new(FilterOptions {
            max_limit: config.tenancy.max_limit,
        });
        let router = TenantQueryRouter::new(resolver, validator.clone(), builder, Arc::new(executor));

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ledger = Arc::new(QuotaLedger::new(
            Arc::new(PgQuotaStore::new(pool.clone(), &shared_schema)),
            directory.clone(),
            Arc::new(PgSyncJobControl::new(pool.clone(), &shared_schema, router.clone())),
            Arc::new(PgNotifier::new(pool, &shared_schema)),
            clock.clone(),
            config.quota.clone(),
        ));

        Ok(Self {
            database,
            shared_schema,
            directory,
            audit,
            validator,
            router,
            ledger,
            clock,
            reset_tick: Duration::from_secs(config.quota.reset_tick_secs.max(1)),
        })
    }

    pub fn scheduler(&self) -> QuotaResetScheduler {
        QuotaResetScheduler::new(
            self.ledger.clone(),
            self.directory.clone(),
            self.clock.clone(),
            self.reset_tick,
        )
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            router: self.router.clone(),
            validator: self.validator.clone(),
            audit: self.audit.clone(),
            ledger: self.ledger.clone(),
            database: Some(self.database.clone()),
        }
    }
}
