mod common;

use std::time::Duration as StdDuration;

use adops_tenancy::quota::sync_jobs::SyncJobControl;
use adops_tenancy::quota::{QuotaResetScheduler, ResetMode, SyncPause};
use anyhow::Result;
use chrono::{Duration, TimeZone, Utc};
use chrono_tz::Tz;
use common::Harness;

#[tokio::test]
async fn midnight_reset_clears_quota_pause_and_resumes_recent_jobs() -> Result<()> {
    let h = Harness::new();
    h.organization("org-1", "acme", Tz::UTC);
    h.store.set_limit("org-1", 1000);

    let yesterday = h.today(Tz::UTC);
    let after_midnight = Utc.with_ymd_and_hms(2026, 3, 11, 0, 0, 5).unwrap();
    h.sync_jobs.add_job("org-1", "recent", "paused", Some("quota_exceeded"), after_midnight - Duration::hours(20));
    h.sync_jobs.add_job("org-1", "stale", "paused", Some("quota_exceeded"), after_midnight - Duration::hours(30));
    h.sync_jobs.add_job("org-1", "manual", "paused", Some("user_request"), after_midnight - Duration::hours(1));

    h.ledger.record_usage("org-1", 1000).await?;
    assert_eq!(
        h.sync_jobs.pause_state("org-1").await?,
        SyncPause::Paused { reason: Some("quota_exceeded".to_string()) }
    );

    h.clock.set(after_midnight);
    let outcome = h.ledger.reset_organization("org-1", ResetMode::Rollover).await?;
    assert!(outcome.pause_cleared);
    assert_eq!(outcome.jobs_resumed, 1);
    assert_eq!(outcome.used_units, 0);
    assert_eq!(outcome.usage_date, h.today(Tz::UTC));

    assert_eq!(h.store.used("org-1", h.today(Tz::UTC)), 0);
    assert_eq!(h.store.used("org-1", yesterday), 1000);
    assert!(h.ledger.check_quota("org-1", 1000).await?.allowed);
    assert_eq!(h.sync_jobs.pause_state("org-1").await?, SyncPause::Active);
    assert_eq!(h.sync_jobs.job("recent").unwrap().status, "pending");
    assert_eq!(h.sync_jobs.job("stale").unwrap().status, "paused");
    assert_eq!(h.sync_jobs.job("manual").unwrap().status, "paused");
    Ok(())
}

#[tokio::test]
async fn usage_after_midnight_survives_the_scheduled_reset() -> Result<()> {
    let h = Harness::new();
    h.organization("org-1", "acme", Tz::UTC);
    h.store.set_limit("org-1", 1000);

    let midnight = Utc.with_ymd_and_hms(2026, 3, 11, 0, 0, 0).unwrap();
    let scheduler = QuotaResetScheduler::new(
        h.ledger.clone(),
        h.directory.clone(),
        h.clock.clone(),
        StdDuration::from_secs(60),
    );
    scheduler.mark(midnight - Duration::seconds(30)).await;

    // Debited after midnight but before the scheduler's next tick
    h.clock.set(midnight + Duration::seconds(10));
    h.ledger.record_usage("org-1", 900).await?;

    h.clock.set(midnight + Duration::seconds(30));
    let report = scheduler.tick().await?;
    assert_eq!(report.reset.len(), 1);
    assert_eq!(report.reset[0].mode, ResetMode::Rollover);
    assert_eq!(report.reset[0].used_units, 900);

    assert_eq!(h.store.used("org-1", h.today(Tz::UTC)), 900);
    let check = h.ledger.check_quota("org-1", 900).await?;
    assert!(!check.allowed);
    assert_eq!(check.current_usage, 900);
    Ok(())
}

#[tokio::test]
async fn manual_clear_zeroes_the_current_day() -> Result<()> {
    let h = Harness::new();
    h.organization("org-1", "acme", Tz::UTC);
    h.store.set_limit("org-1", 1000);
    h.ledger.record_usage("org-1", 600).await?;

    let outcome = h.ledger.reset_organization("org-1", ResetMode::Clear).await?;
    assert_eq!(outcome.mode, ResetMode::Clear);
    assert_eq!(outcome.used_units, 0);
    assert_eq!(h.store.used("org-1", h.today(Tz::UTC)), 0);

    h.ledger.record_usage("org-1", 100).await?;
    let outcome = h.ledger.reset_organization("org-1", ResetMode::Rollover).await?;
    assert_eq!(outcome.used_units, 100);
    assert_eq!(h.store.used("org-1", h.today(Tz::UTC)), 100);
    Ok(())
}

#[tokio::test]
async fn grace_window_is_configurable() -> Result<()> {
    let h = Harness::with_settings(adops_tenancy::config::QuotaSettings {
        resume_grace_hours: 48,
        ..Default::default()
    });
    h.organization("org-1", "acme", Tz::UTC);
    let now = common::start_of_test();
    h.sync_jobs.add_job("org-1", "stale", "paused", Some("quota_exceeded"), now - Duration::hours(30));

    let outcome = h.ledger.reset_organization("org-1", ResetMode::Rollover).await?;
    assert_eq!(outcome.jobs_resumed, 1);
    Ok(())
}

#[tokio::test]
async fn pause_for_other_reason_survives_reset() -> Result<()> {
    let h = Harness::new();
    h.organization("org-1", "acme", Tz::UTC);
    h.sync_jobs.pause("org-1", "billing_hold");
    h.sync_jobs.add_job("org-1", "job", "paused", Some("quota_exceeded"), common::start_of_test());

    let outcome = h.ledger.reset_organization("org-1", ResetMode::Rollover).await?;
    assert!(!outcome.pause_cleared);
    assert_eq!(outcome.jobs_resumed, 0);
    assert_eq!(
        h.sync_jobs.pause_state("org-1").await?,
        SyncPause::Paused { reason: Some("billing_hold".to_string()) }
    );
    assert_eq!(h.sync_jobs.job("job").unwrap().status, "paused");
    Ok(())
}

#[tokio::test]
async fn pausing_twice_is_a_no_op() -> Result<()> {
    let h = Harness::new();
    h.sync_jobs.add_job("org-1", "job", "running", None, common::start_of_test());
    assert_eq!(h.sync_jobs.pause_for_quota("org-1").await?, 1);
    assert_eq!(h.sync_jobs.pause_for_quota("org-1").await?, 0);
    Ok(())
}

#[tokio::test]
async fn scheduler_resets_only_organizations_past_local_midnight() -> Result<()> {
    let h = Harness::new();
    h.organization("org-tokyo", "tokyo", chrono_tz::Asia::Tokyo);
    h.organization("org-utc", "utc", Tz::UTC);

    // 14:50 UTC is 23:50 in Tokyo
    let before = Utc.with_ymd_and_hms(2026, 3, 10, 14, 50, 0).unwrap();
    h.clock.set(before);
    h.store.set_usage("org-tokyo", h.today(chrono_tz::Asia::Tokyo), 700);
    h.store.set_usage("org-utc", h.today(Tz::UTC), 700);

    let scheduler = QuotaResetScheduler::new(
        h.ledger.clone(),
        h.directory.clone(),
        h.clock.clone(),
        StdDuration::from_secs(60),
    );
    assert!(scheduler.tick().await?.reset.is_empty());

    h.clock.advance(Duration::minutes(20));
    let report = scheduler.tick().await?;
    assert_eq!(report.reset.len(), 1);
    assert_eq!(report.reset[0].organization_id, "org-tokyo");
    assert_eq!(report.reset[0].used_units, 0);
    assert!(report.failed.is_empty());

    assert_eq!(h.store.used("org-tokyo", h.today(chrono_tz::Asia::Tokyo)), 0);
    assert_eq!(h.store.used("org-utc", h.today(Tz::UTC)), 700);

    h.clock.advance(Duration::minutes(1));
    assert!(scheduler.tick().await?.reset.is_empty());
    Ok(())
}

#[tokio::test]
async fn a_failing_organization_does_not_block_others() -> Result<()> {
    let h = Harness::new();
    h.organization("org-a", "alpha", Tz::UTC);
    h.organization("org-b", "beta", Tz::UTC);
    h.organization("org-c", "gamma", Tz::UTC);
    h.sync_jobs.fail_organization("org-b");

    let midnight = Utc.with_ymd_and_hms(2026, 3, 11, 0, 0, 0).unwrap();
    let scheduler = QuotaResetScheduler::new(
        h.ledger.clone(),
        h.directory.clone(),
        h.clock.clone(),
        StdDuration::from_secs(60),
    );
    scheduler.mark(midnight - Duration::minutes(1)).await;
    h.clock.set(midnight + Duration::seconds(5));

    let report = scheduler.tick().await?;
    let mut reset: Vec<_> = report.reset.iter().map(|o| o.organization_id.as_str()).collect();
    reset.sort();
    assert_eq!(reset, vec!["org-a", "org-c"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "org-b");
    Ok(())
}
