//! One periodic tick that resets every organization whose local midnight
//! passed since the previous tick.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::error::TenantError;
use crate::quota::clock::Clock;
use crate::quota::ledger::{next_local_midnight, QuotaLedger};
use crate::quota::types::{ResetMode, ResetOutcome};
use crate::services::schema_resolver::OrganizationDirectory;

/// Did a local midnight in `tz` fall within `(since, now]`?
pub fn crossed_local_midnight(tz: Tz, since: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    since < now && next_local_midnight(tz, since) <= now
}

#[derive(Debug, Default, Serialize)]
pub struct TickReport {
    pub reset: Vec<ResetOutcome>,
    pub failed: Vec<(String, String)>,
}

pub struct QuotaResetScheduler {
    ledger: Arc<QuotaLedger>,
    directory: Arc<dyn OrganizationDirectory>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    last_tick: Mutex<Option<DateTime<Utc>>>,
}

impl QuotaResetScheduler {
    pub fn new(
        ledger: Arc<QuotaLedger>,
        directory: Arc<dyn OrganizationDirectory>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        Self {
            ledger,
            directory,
            clock,
            interval,
            last_tick: Mutex::new(None),
        }
    }

    /// Start counting from `instant` instead of the first tick
    pub async fn mark(&self, instant: DateTime<Utc>) {
        *self.last_tick.lock().await = Some(instant);
    }

    /// Reset the organizations that crossed local midnight since the last
    /// tick. The first tick only records its time. One organization failing
    /// does not stop the others.
    pub async fn tick(&self) -> Result<TickReport, TenantError> {
        let now = self.clock.now();
        let mut last_tick = self.last_tick.lock().await;
        let Some(since) = last_tick.replace(now) else {
            debug!("Quota reset scheduler primed at {}", now);
            return Ok(TickReport::default());
        };

        let due: Vec<_> = self
            .directory
            .list()
            .await?
            .into_iter()
            .filter(|org| crossed_local_midnight(org.timezone, since, now))
            .collect();
        drop(last_tick);

        let results = join_all(
            due.iter()
                .map(|org| self.ledger.reset_organization(&org.id, ResetMode::Rollover)),
        )
        .await;

        let mut report = TickReport::default();
        for (org, result) in due.into_iter().zip(results) {
            match result {
                Ok(outcome) => report.reset.push(outcome),
                Err(e) => {
                    error!(organization_id = %org.id, "Quota reset failed: {}", e);
                    report.failed.push((org.id, e.to_string()));
                }
            }
        }
        Ok(report)
    }

    /// Tick forever on the configured interval
    pub async fn run(self: Arc<Self>) {
        info!("Quota reset scheduler running every {:?}", self.interval);
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match self.tick().await {
                Ok(report) if !report.reset.is_empty() || !report.failed.is_empty() => {
                    info!(reset = report.reset.len(), failed = report.failed.len(), "Quota reset tick");
                }
                Ok(_) => {}
                Err(e) => error!("Quota reset tick failed: {}", e),
            }
        }
    }
}
