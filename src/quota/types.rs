use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Per-organization YouTube credentials and budget, owned by admin settings
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaConfig {
    pub organization_id: String,
    pub daily_limit: i64,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub oauth_client_id: Option<String>,
    #[serde(skip_serializing)]
    pub oauth_client_secret: Option<String>,
}

impl QuotaConfig {
    /// First 12 hex characters of the API key's SHA-256, safe to display
    pub fn api_key_fingerprint(&self) -> Option<String> {
        self.api_key.as_ref().map(|key| {
            let digest = Sha256::digest(key.as_bytes());
            format!("{:x}", digest)[..12].to_string()
        })
    }
}

impl fmt::Debug for QuotaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuotaConfig")
            .field("organization_id", &self.organization_id)
            .field("daily_limit", &self.daily_limit)
            .field("api_key", &self.api_key_fingerprint().map(|fp| format!("sha256:{}", fp)))
            .field("oauth_client_id", &self.oauth_client_id)
            .field("oauth_client_secret", &self.oauth_client_secret.as_ref().map(|_| "****"))
            .finish()
    }
}

/// Everything the ledger needs to know about one organization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaProfile {
    pub organization_id: String,
    pub daily_limit: i64,
    pub timezone: Tz,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaCheck {
    pub allowed: bool,
    pub current_usage: i64,
    pub limit: i64,
    pub remaining: i64,
    pub percent_used: f64,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Threshold {
    Warning,
    Exceeded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageReceipt {
    pub new_usage: i64,
    pub remaining: i64,
    pub thresholds_crossed: Vec<Threshold>,
}

impl UsageReceipt {
    pub fn crossed(&self, threshold: Threshold) -> bool {
        self.thresholds_crossed.contains(&threshold)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaState {
    Fresh,
    Accumulating,
    Warned,
    Exceeded,
}

impl QuotaState {
    pub fn classify(used: i64, limit: i64, warning_percent: i64) -> Self {
        if used <= 0 {
            QuotaState::Fresh
        } else if used >= limit {
            QuotaState::Exceeded
        } else if used * 100 >= limit * warning_percent {
            QuotaState::Warned
        } else {
            QuotaState::Accumulating
        }
    }
}

/// How a reset treats units already recorded on the current local day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ResetMode {
    /// Scheduled midnight rollover: opens the day at zero, keeps units
    /// debited between midnight and the tick
    Rollover,
    /// Operator reset: zeroes the current day
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetOutcome {
    pub organization_id: String,
    pub usage_date: NaiveDate,
    pub mode: ResetMode,
    /// Units on the day's counter once the reset ran
    pub used_units: i64,
    pub pause_cleared: bool,
    pub jobs_resumed: u64,
}
