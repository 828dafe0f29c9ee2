//! In-memory implementations of every storage seam, for tests and local runs
//! without a database.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::database::executor::{QueryExecutor, Record};
use crate::database::query_builder::Statement;
use crate::error::TenantError;
use crate::quota::clock::Clock;
use crate::quota::notifier::{Notification, Notifier};
use crate::quota::store::QuotaStore;
use crate::quota::sync_jobs::{SyncJobControl, SyncPause, QUOTA_PAUSE_REASON, RUNNABLE_STATUSES};
use crate::quota::types::QuotaConfig;
use crate::services::audit_log::{AuditSink, TenantAccessLogEntry};
use crate::services::schema_resolver::{Organization, OrganizationDirectory};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn injected_failure(what: &str) -> TenantError {
    TenantError::store(what.to_string(), sqlx::Error::PoolTimedOut)
}

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *lock(&self.now) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }
}

#[derive(Default)]
pub struct MemoryDirectory {
    organizations: Mutex<Vec<Organization>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: &str, slug: &str, timezone: Tz) -> Organization {
        let organization = Organization {
            id: id.to_string(),
            slug: slug.to_string(),
            name: slug.to_string(),
            timezone,
        };
        let mut organizations = lock(&self.organizations);
        organizations.retain(|o| o.id != id);
        organizations.push(organization.clone());
        organization
    }
}

#[async_trait]
impl OrganizationDirectory for MemoryDirectory {
    async fn find(&self, slug_or_id: &str) -> Result<Option<Organization>, TenantError> {
        let organizations = lock(&self.organizations);
        Ok(organizations
            .iter()
            .find(|o| o.id == slug_or_id)
            .or_else(|| organizations.iter().find(|o| o.slug == slug_or_id))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Organization>, TenantError> {
        Ok(lock(&self.organizations).clone())
    }
}

#[derive(Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<TenantAccessLogEntry>>,
    fail_writes: AtomicBool,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<TenantAccessLogEntry> {
        lock(&self.entries).clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuditSink for MemoryAuditLog {
    async fn record(&self, entry: &TenantAccessLogEntry) -> Result<(), TenantError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected_failure("writing tenant access log"));
        }
        lock(&self.entries).push(entry.clone());
        Ok(())
    }

    async fn recent(
        &self,
        organization_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<TenantAccessLogEntry>, TenantError> {
        let entries = lock(&self.entries);
        Ok(entries
            .iter()
            .rev()
            .filter(|e| organization_id.map_or(true, |org| e.accessed_org_id == org))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryQuotaStore {
    configs: Mutex<HashMap<String, QuotaConfig>>,
    usage: Mutex<HashMap<(String, NaiveDate), i64>>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_limit(&self, organization_id: &str, daily_limit: i64) {
        lock(&self.configs).insert(
            organization_id.to_string(),
            QuotaConfig {
                organization_id: organization_id.to_string(),
                daily_limit,
                api_key: None,
                oauth_client_id: None,
                oauth_client_secret: None,
            },
        );
    }

    pub fn set_usage(&self, organization_id: &str, date: NaiveDate, used: i64) {
        lock(&self.usage).insert((organization_id.to_string(), date), used);
    }

    pub fn used(&self, organization_id: &str, date: NaiveDate) -> i64 {
        lock(&self.usage)
            .get(&(organization_id.to_string(), date))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn config(&self, organization_id: &str) -> Result<Option<QuotaConfig>, TenantError> {
        Ok(lock(&self.configs).get(organization_id).cloned())
    }

    async fn save_config(&self, config: &QuotaConfig) -> Result<(), TenantError> {
        lock(&self.configs).insert(config.organization_id.clone(), config.clone());
        Ok(())
    }

    async fn usage(&self, organization_id: &str, date: NaiveDate) -> Result<i64, TenantError> {
        Ok(self.used(organization_id, date))
    }

    async fn increment(&self, organization_id: &str, date: NaiveDate, cost: i64) -> Result<i64, TenantError> {
        tokio::task::yield_now().await;
        let mut usage = lock(&self.usage);
        let used = usage.entry((organization_id.to_string(), date)).or_insert(0);
        *used += cost;
        Ok(*used)
    }

    async fn open_day(&self, organization_id: &str, date: NaiveDate) -> Result<i64, TenantError> {
        let mut usage = lock(&self.usage);
        Ok(*usage.entry((organization_id.to_string(), date)).or_insert(0))
    }

    async fn reset(&self, organization_id: &str, date: NaiveDate) -> Result<(), TenantError> {
        self.set_usage(organization_id, date, 0);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySyncJob {
    pub id: String,
    pub organization_id: String,
    pub status: String,
    pub pause_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct SyncState {
    pauses: HashMap<String, Option<String>>,
    jobs: Vec<MemorySyncJob>,
    pause_calls: usize,
    failing: Vec<String>,
}

pub struct MemorySyncJobs {
    clock: Arc<dyn Clock>,
    state: Mutex<SyncState>,
}

impl MemorySyncJobs {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            state: Mutex::new(SyncState::default()),
        }
    }

    pub fn add_job(&self, organization_id: &str, id: &str, status: &str, pause_reason: Option<&str>, updated_at: DateTime<Utc>) {
        lock(&self.state).jobs.push(MemorySyncJob {
            id: id.to_string(),
            organization_id: organization_id.to_string(),
            status: status.to_string(),
            pause_reason: pause_reason.map(str::to_string),
            updated_at,
        });
    }

    /// Mark the organization paused with an arbitrary reason
    pub fn pause(&self, organization_id: &str, reason: &str) {
        lock(&self.state)
            .pauses
            .insert(organization_id.to_string(), Some(reason.to_string()));
    }

    pub fn job(&self, id: &str) -> Option<MemorySyncJob> {
        lock(&self.state).jobs.iter().find(|j| j.id == id).cloned()
    }

    pub fn pause_calls(&self) -> usize {
        lock(&self.state).pause_calls
    }

    /// Make every call for this organization fail
    pub fn fail_organization(&self, organization_id: &str) {
        lock(&self.state).failing.push(organization_id.to_string());
    }

    fn check_failure(&self, organization_id: &str) -> Result<(), TenantError> {
        if lock(&self.state).failing.iter().any(|o| o == organization_id) {
            return Err(injected_failure("updating sync jobs"));
        }
        Ok(())
    }
}

#[async_trait]
impl SyncJobControl for MemorySyncJobs {
    async fn pause_for_quota(&self, organization_id: &str) -> Result<u64, TenantError> {
        self.check_failure(organization_id)?;
        let now = self.clock.now();
        let mut state = lock(&self.state);
        state.pause_calls += 1;
        state
            .pauses
            .entry(organization_id.to_string())
            .or_insert_with(|| Some(QUOTA_PAUSE_REASON.to_string()));

        let mut paused = 0;
        for job in state.jobs.iter_mut().filter(|j| j.organization_id == organization_id) {
            if RUNNABLE_STATUSES.contains(&job.status.as_str()) {
                job.status = "paused".to_string();
                job.pause_reason = Some(QUOTA_PAUSE_REASON.to_string());
                job.updated_at = now;
                paused += 1;
            }
        }
        Ok(paused)
    }

    async fn clear_quota_pause(&self, organization_id: &str) -> Result<bool, TenantError> {
        self.check_failure(organization_id)?;
        let mut state = lock(&self.state);
        let is_quota = matches!(
            state.pauses.get(organization_id),
            Some(Some(reason)) if reason == QUOTA_PAUSE_REASON
        );
        if is_quota {
            state.pauses.remove(organization_id);
        }
        Ok(is_quota)
    }

    async fn pause_state(&self, organization_id: &str) -> Result<SyncPause, TenantError> {
        self.check_failure(organization_id)?;
        Ok(match lock(&self.state).pauses.get(organization_id) {
            None => SyncPause::Active,
            Some(reason) => SyncPause::Paused { reason: reason.clone() },
        })
    }

    async fn resume_quota_paused(&self, organization_id: &str, since: DateTime<Utc>) -> Result<u64, TenantError> {
        self.check_failure(organization_id)?;
        let now = self.clock.now();
        let mut state = lock(&self.state);
        let mut resumed = 0;
        for job in state.jobs.iter_mut().filter(|j| j.organization_id == organization_id) {
            if job.status == "paused"
                && job.pause_reason.as_deref() == Some(QUOTA_PAUSE_REASON)
                && job.updated_at >= since
            {
                job.status = "pending".to_string();
                job.pause_reason = None;
                job.updated_at = now;
                resumed += 1;
            }
        }
        Ok(resumed)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        lock(&self.sent).clone()
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), TenantError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(injected_failure("writing notification"));
        }
        lock(&self.sent).push(notification);
        Ok(())
    }
}

/// Records statements instead of running them; replies with queued rows
#[derive(Default)]
pub struct RecordingExecutor {
    statements: Mutex<Vec<Statement>>,
    replies: Mutex<VecDeque<Vec<Record>>>,
    fail_next: AtomicBool,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statements(&self) -> Vec<Statement> {
        lock(&self.statements).clone()
    }

    pub fn reply_with(&self, rows: Vec<Record>) {
        lock(&self.replies).push_back(rows);
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl QueryExecutor for RecordingExecutor {
    async fn run(&self, statement: &Statement) -> Result<Vec<Record>, sqlx::Error> {
        lock(&self.statements).push(statement.clone());
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(lock(&self.replies).pop_front().unwrap_or_default())
    }
}
