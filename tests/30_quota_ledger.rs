mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use adops_tenancy::config::QuotaSettings;
use adops_tenancy::quota::{Endpoint, QuotaState, Severity, Threshold};
use adops_tenancy::{ExecuteError, TenantError};
use anyhow::Result;
use chrono_tz::Tz;
use common::Harness;

#[derive(Debug, thiserror::Error)]
#[error("youtube returned 503")]
struct UpstreamError;

fn harness_with_limit(limit: i64) -> Harness {
    let h = Harness::new();
    h.organization("org-1", "acme", Tz::UTC);
    h.store.set_limit("org-1", limit);
    h
}

#[tokio::test]
async fn concurrent_debits_lose_nothing_and_alert_once() -> Result<()> {
    let h = harness_with_limit(1000);

    let calls = [400, 400, 300].map(|cost| {
        let ledger = h.ledger.clone();
        tokio::spawn(async move { ledger.record_usage("org-1", cost).await })
    });
    let mut receipts = Vec::new();
    for call in calls {
        receipts.push(call.await??);
    }

    assert_eq!(h.store.used("org-1", h.today(Tz::UTC)), 1100);

    let warnings = receipts.iter().filter(|r| r.crossed(Threshold::Warning)).count();
    let exceeded = receipts.iter().filter(|r| r.crossed(Threshold::Exceeded)).count();
    assert_eq!(warnings, 1);
    assert_eq!(exceeded, 1);

    let notifications = h.notifier.notifications();
    assert_eq!(notifications.iter().filter(|n| n.severity == Severity::Warning).count(), 1);
    assert_eq!(notifications.iter().filter(|n| n.severity == Severity::Error).count(), 1);
    assert_eq!(h.sync_jobs.pause_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn sequential_debits_cross_each_threshold_at_the_right_call() -> Result<()> {
    let h = harness_with_limit(1000);

    let first = h.ledger.record_usage("org-1", 400).await?;
    assert!(first.thresholds_crossed.is_empty());
    assert_eq!(first.remaining, 600);

    let second = h.ledger.record_usage("org-1", 400).await?;
    assert_eq!(second.thresholds_crossed, vec![Threshold::Warning]);

    let third = h.ledger.record_usage("org-1", 300).await?;
    assert_eq!(third.thresholds_crossed, vec![Threshold::Exceeded]);
    assert_eq!(third.new_usage, 1100);
    assert_eq!(third.remaining, 0);

    let fourth = h.ledger.record_usage("org-1", 1).await?;
    assert!(fourth.thresholds_crossed.is_empty());
    assert_eq!(h.sync_jobs.pause_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn one_call_crossing_both_thresholds_fires_both() -> Result<()> {
    let h = harness_with_limit(1000);
    let receipt = h.ledger.record_usage("org-1", 1600).await?;
    assert_eq!(receipt.thresholds_crossed, vec![Threshold::Warning, Threshold::Exceeded]);
    assert_eq!(h.notifier.notifications().len(), 2);
    Ok(())
}

#[tokio::test]
async fn check_quota_is_read_only() -> Result<()> {
    let h = harness_with_limit(1000);
    h.ledger.record_usage("org-1", 250).await?;

    let check = h.ledger.check_quota("org-1", 100).await?;
    assert!(check.allowed);
    assert_eq!(check.current_usage, 250);
    assert_eq!(check.remaining, 750);
    assert!((check.percent_used - 25.0).abs() < f64::EPSILON);
    assert_eq!(h.store.used("org-1", h.today(Tz::UTC)), 250);
    Ok(())
}

#[tokio::test]
async fn failed_call_consumes_nothing() -> Result<()> {
    let h = harness_with_limit(1000);

    let result: Result<(), _> = h
        .ledger
        .execute_with_quota("org-1", Endpoint::SearchList, || async { Err(UpstreamError) })
        .await;
    assert!(matches!(result, Err(ExecuteError::Call(UpstreamError))));
    assert_eq!(h.store.used("org-1", h.today(Tz::UTC)), 0);
    Ok(())
}

#[tokio::test]
async fn negative_cost_is_rejected_before_calling() -> Result<()> {
    let h = harness_with_limit(1000);
    let invoked = Arc::new(AtomicUsize::new(0));
    let counter = invoked.clone();

    let result = h
        .ledger
        .execute_with_quota("org-1", Endpoint::Custom(-5), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, UpstreamError>(())
        })
        .await;

    assert!(matches!(result, Err(ExecuteError::Quota(TenantError::InvalidValue(_)))));
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
    assert_eq!(h.store.used("org-1", h.today(Tz::UTC)), 0);
    Ok(())
}

#[tokio::test]
async fn successful_call_is_recorded_exactly_once() -> Result<()> {
    let h = harness_with_limit(1000);
    let invocations = AtomicUsize::new(0);

    let videos = h
        .ledger
        .execute_with_quota("org-1", Endpoint::SearchList, || async {
            invocations.fetch_add(1, Ordering::SeqCst);
            Ok::<_, UpstreamError>(vec!["dQw4w9WgXcQ"])
        })
        .await?;

    assert_eq!(videos.len(), 1);
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.used("org-1", h.today(Tz::UTC)), 100);
    Ok(())
}

#[tokio::test]
async fn nearly_spent_budget_rejects_without_calling() -> Result<()> {
    let h = harness_with_limit(10_000);
    h.store.set_usage("org-1", h.today(Tz::UTC), 9950);

    let check = h.ledger.check_quota("org-1", 100).await?;
    assert!(!check.allowed);
    assert_eq!(check.current_usage, 9950);
    assert_eq!(check.limit, 10_000);

    let invoked = Arc::new(AtomicUsize::new(0));
    let counter = invoked.clone();
    let result = h
        .ledger
        .execute_with_quota("org-1", Endpoint::Custom(100), move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, UpstreamError>(())
        })
        .await;

    match result {
        Err(ExecuteError::Quota(TenantError::QuotaExceeded { current_usage, limit, reset_at, .. })) => {
            assert_eq!(current_usage, 9950);
            assert_eq!(limit, 10_000);
            assert_eq!(reset_at, check.reset_at);
        }
        other => panic!("expected quota rejection, got {:?}", other.map(|_| ())),
    }
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
    assert_eq!(h.store.used("org-1", h.today(Tz::UTC)), 9950);
    Ok(())
}

#[tokio::test]
async fn state_walks_fresh_to_exceeded() -> Result<()> {
    let h = harness_with_limit(1000);
    assert_eq!(h.ledger.state("org-1").await?, QuotaState::Fresh);
    h.ledger.record_usage("org-1", 10).await?;
    assert_eq!(h.ledger.state("org-1").await?, QuotaState::Accumulating);
    h.ledger.record_usage("org-1", 800).await?;
    assert_eq!(h.ledger.state("org-1").await?, QuotaState::Warned);
    h.ledger.record_usage("org-1", 190).await?;
    assert_eq!(h.ledger.state("org-1").await?, QuotaState::Exceeded);
    Ok(())
}

#[tokio::test]
async fn unconfigured_organization_uses_default_limit() -> Result<()> {
    let h = Harness::with_settings(QuotaSettings {
        default_daily_limit: 500,
        ..QuotaSettings::default()
    });
    h.organization("org-2", "beta", Tz::UTC);
    let check = h.ledger.check_quota("beta", 0).await?;
    assert_eq!(check.limit, 500);
    Ok(())
}

#[tokio::test]
async fn notifier_outage_does_not_undo_usage() -> Result<()> {
    let h = harness_with_limit(100);
    h.notifier.fail(true);
    let receipt = h.ledger.record_usage("org-1", 100).await?;
    assert_eq!(receipt.new_usage, 100);
    assert_eq!(h.sync_jobs.pause_calls(), 1);
    assert_eq!(h.store.used("org-1", h.today(Tz::UTC)), 100);
    Ok(())
}

#[tokio::test]
async fn unknown_organization_is_not_found() -> Result<()> {
    let h = Harness::new();
    let err = h.ledger.check_quota("ghost", 1).await.unwrap_err();
    assert!(matches!(err, TenantError::NotFound(_)));
    Ok(())
}
