//! Per-organization daily YouTube quota budget.
//!
//! Usage is counted per organization-local calendar day. Each debit is one
//! atomic increment in the store; thresholds are detected by comparing the
//! totals before and after that increment, so exactly one caller observes
//! each crossing no matter how calls interleave.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::QuotaSettings;
use crate::error::{ExecuteError, TenantError};
use crate::quota::clock::Clock;
use crate::quota::notifier::{Notification, Notifier, Severity};
use crate::quota::store::QuotaStore;
use crate::quota::sync_jobs::{SyncJobControl, SyncPause};
use crate::quota::types::{QuotaCheck, QuotaProfile, QuotaState, ResetMode, ResetOutcome, Threshold, UsageReceipt};
use crate::quota::youtube::Endpoint;
use crate::services::schema_resolver::OrganizationDirectory;

/// Organization-local calendar date of `instant`
pub fn local_date(tz: Tz, instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Start of `date` in `tz`, as UTC. When midnight falls in a DST gap the
/// first valid local hour is used.
pub fn local_midnight(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    (0..24)
        .filter_map(|hour| date.and_hms_opt(hour, 0, 0))
        .find_map(|local| tz.from_local_datetime(&local).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::default())))
}

/// The first local midnight strictly after `instant`
pub fn next_local_midnight(tz: Tz, instant: DateTime<Utc>) -> DateTime<Utc> {
    let today = local_date(tz, instant);
    let tomorrow = today.succ_opt().unwrap_or(today);
    local_midnight(tz, tomorrow)
}

fn validate_cost(cost: i64) -> Result<(), TenantError> {
    if cost < 0 {
        return Err(TenantError::invalid_value(format!("quota cost must not be negative, got {}", cost)));
    }
    Ok(())
}

pub struct QuotaLedger {
    store: Arc<dyn QuotaStore>,
    directory: Arc<dyn OrganizationDirectory>,
    sync_jobs: Arc<dyn SyncJobControl>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    settings: QuotaSettings,
}

impl QuotaLedger {
    pub fn new(
        store: Arc<dyn QuotaStore>,
        directory: Arc<dyn OrganizationDirectory>,
        sync_jobs: Arc<dyn SyncJobControl>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        settings: QuotaSettings,
    ) -> Self {
        Self {
            store,
            directory,
            sync_jobs,
            notifier,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &QuotaSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn QuotaStore> {
        &self.store
    }

    pub async fn profile(&self, organization: &str) -> Result<QuotaProfile, TenantError> {
        let org = self
            .directory
            .find(organization)
            .await?
            .ok_or_else(|| TenantError::not_found(format!("organization '{}'", organization)))?;
        let daily_limit = self
            .store
            .config(&org.id)
            .await?
            .map(|c| c.daily_limit)
            .unwrap_or(self.settings.default_daily_limit);
        Ok(QuotaProfile {
            organization_id: org.id,
            daily_limit,
            timezone: org.timezone,
        })
    }

    /// Read-only: would a call costing `cost` fit in today's budget?
    pub async fn check_quota(&self, organization: &str, cost: i64) -> Result<QuotaCheck, TenantError> {
        let profile = self.profile(organization).await?;
        let now = self.clock.now();
        let used = self
            .store
            .usage(&profile.organization_id, local_date(profile.timezone, now))
            .await?;
        Ok(Self::assess(&profile, used, cost, now))
    }

    fn assess(profile: &QuotaProfile, used: i64, cost: i64, now: DateTime<Utc>) -> QuotaCheck {
        let limit = profile.daily_limit;
        let percent_used = if limit > 0 {
            used as f64 * 100.0 / limit as f64
        } else {
            100.0
        };
        QuotaCheck {
            allowed: used + cost <= limit,
            current_usage: used,
            limit,
            remaining: (limit - used).max(0),
            percent_used,
            reset_at: next_local_midnight(profile.timezone, now),
        }
    }

    /// Debit `cost` units and fire any threshold side effects this call crossed
    pub async fn record_usage(&self, organization: &str, cost: i64) -> Result<UsageReceipt, TenantError> {
        validate_cost(cost)?;
        let profile = self.profile(organization).await?;
        let date = local_date(profile.timezone, self.clock.now());
        let new_usage = self.store.increment(&profile.organization_id, date, cost).await?;
        let previous = new_usage - cost;

        let thresholds_crossed = self.crossed(previous, new_usage, profile.daily_limit);
        for threshold in &thresholds_crossed {
            self.on_threshold(&profile, *threshold, new_usage).await;
        }

        Ok(UsageReceipt {
            new_usage,
            remaining: (profile.daily_limit - new_usage).max(0),
            thresholds_crossed,
        })
    }

    fn crossed(&self, previous: i64, current: i64, limit: i64) -> Vec<Threshold> {
        let warn_at = limit * self.settings.warning_percent;
        let mut crossed = Vec::new();
        if previous * 100 < warn_at && current * 100 >= warn_at {
            crossed.push(Threshold::Warning);
        }
        if previous < limit && current >= limit {
            crossed.push(Threshold::Exceeded);
        }
        crossed
    }

    /// Side effects run after the increment committed; failures are logged
    /// and never undo the recorded usage
    async fn on_threshold(&self, profile: &QuotaProfile, threshold: Threshold, usage: i64) {
        let org = &profile.organization_id;
        let notification = match threshold {
            Threshold::Warning => {
                warn!(organization_id = %org, usage, limit = profile.daily_limit, "YouTube quota warning threshold reached");
                Notification {
                    organization_id: org.clone(),
                    severity: Severity::Warning,
                    kind: "youtube_quota_warning".to_string(),
                    title: "YouTube quota almost used".to_string(),
                    message: format!(
                        "{} of {} daily YouTube API units used ({}% threshold).",
                        usage, profile.daily_limit, self.settings.warning_percent
                    ),
                }
            }
            Threshold::Exceeded => {
                error!(organization_id = %org, usage, limit = profile.daily_limit, "YouTube quota exhausted, pausing sync");
                if let Err(e) = self.sync_jobs.pause_for_quota(org).await {
                    error!(organization_id = %org, "Failed to pause YouTube sync: {}", e);
                }
                Notification {
                    organization_id: org.clone(),
                    severity: Severity::Error,
                    kind: "youtube_quota_exceeded".to_string(),
                    title: "YouTube quota exhausted".to_string(),
                    message: format!(
                        "Daily YouTube API quota of {} units is used up. Sync is paused until local midnight.",
                        profile.daily_limit
                    ),
                }
            }
        };
        if let Err(e) = self.notifier.notify(notification).await {
            error!(organization_id = %org, "Failed to send quota notification: {}", e);
        }
    }

    /// Check, call, then record on success only. A denied check never runs
    /// `call`; a failed call consumes nothing.
    pub async fn execute_with_quota<T, E, F, Fut>(
        &self,
        organization: &str,
        endpoint: Endpoint,
        call: F,
    ) -> Result<T, ExecuteError<E>>
    where
        E: std::error::Error + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let cost = endpoint.cost();
        validate_cost(cost)?;
        let check = self.check_quota(organization, cost).await?;
        if !check.allowed {
            info!(organization_id = organization, endpoint = %endpoint, "YouTube call rejected by quota");
            return Err(ExecuteError::Quota(TenantError::QuotaExceeded {
                organization_id: organization.to_string(),
                current_usage: check.current_usage,
                limit: check.limit,
                reset_at: check.reset_at,
            }));
        }

        let value = call().await.map_err(ExecuteError::Call)?;
        self.record_usage(organization, cost).await?;
        Ok(value)
    }

    pub async fn state(&self, organization: &str) -> Result<QuotaState, TenantError> {
        let check = self.check_quota(organization, 0).await?;
        Ok(QuotaState::classify(check.current_usage, check.limit, self.settings.warning_percent))
    }

    /// Open the organization's current local day and lift a quota pause.
    /// `Rollover` keeps units already debited today; `Clear` zeroes them.
    pub async fn reset_organization(&self, organization: &str, mode: ResetMode) -> Result<ResetOutcome, TenantError> {
        let profile = self.profile(organization).await?;
        let org = profile.organization_id.as_str();
        let now = self.clock.now();
        let usage_date = local_date(profile.timezone, now);

        let used_units = match mode {
            ResetMode::Rollover => self.store.open_day(org, usage_date).await?,
            ResetMode::Clear => {
                self.store.reset(org, usage_date).await?;
                0
            }
        };
        let pause_cleared = self.sync_jobs.clear_quota_pause(org).await?;

        let jobs_resumed = match self.sync_jobs.pause_state(org).await? {
            SyncPause::Active => {
                let since = now - Duration::hours(self.settings.resume_grace_hours);
                self.sync_jobs.resume_quota_paused(org, since).await?
            }
            SyncPause::Paused { reason } => {
                info!(organization_id = org, reason = ?reason, "Sync paused for another reason, leaving jobs paused");
                0
            }
        };

        info!(organization_id = org, %usage_date, ?mode, used_units, pause_cleared, jobs_resumed, "Quota reset");
        Ok(ResetOutcome {
            organization_id: profile.organization_id.clone(),
            usage_date,
            mode,
            used_units,
            pause_cleared,
            jobs_resumed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn local_date_follows_timezone() {
        let instant = Utc.with_ymd_and_hms(2026, 3, 2, 3, 0, 0).unwrap();
        assert_eq!(local_date(Tz::UTC, instant), NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
        assert_eq!(
            local_date(chrono_tz::America::Los_Angeles, instant),
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
        );
    }

    #[test]
    fn next_midnight_in_new_york() {
        let instant = Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap();
        let reset = next_local_midnight(chrono_tz::America::New_York, instant);
        assert_eq!(reset, Utc.with_ymd_and_hms(2026, 1, 16, 5, 0, 0).unwrap());
    }

    #[test]
    fn midnight_in_dst_gap_moves_forward() {
        // Santiago springs forward at 00:00 local time
        let date = NaiveDate::from_ymd_opt(2026, 9, 6).unwrap();
        let midnight = local_midnight(chrono_tz::America::Santiago, date);
        let local = midnight.with_timezone(&chrono_tz::America::Santiago);
        assert_eq!(local.date_naive(), date);
        assert_eq!(local.format("%H:%M").to_string(), "01:00");
    }
}
