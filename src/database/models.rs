//! Allow-list of tenant tables.
//!
//! Every organization schema holds the same table shapes. Table and column
//! identifiers reach SQL text only through this module, so nothing a caller
//! sends can become an identifier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TenantError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    Integer,
    Float,
    Decimal,
    Boolean,
    Timestamp,
    Json,
}

impl ColumnType {
    /// Postgres type used when provisioning a tenant schema
    pub fn ddl(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "BIGINT",
            ColumnType::Float => "DOUBLE PRECISION",
            ColumnType::Decimal => "NUMERIC(14, 2)",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Timestamp => "TIMESTAMPTZ",
            ColumnType::Json => "JSONB",
        }
    }

    pub fn is_ordered(&self) -> bool {
        !matches!(self, ColumnType::Json | ColumnType::Boolean)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnType,
    pub nullable: bool,
}

const fn col(name: &'static str, kind: ColumnType) -> Column {
    Column { name, kind, nullable: true }
}

const fn req(name: &'static str, kind: ColumnType) -> Column {
    Column { name, kind, nullable: false }
}

/// Columns maintained by the store; never accepted in create/update payloads
pub const SYSTEM_COLUMNS: &[&str] = &["created_at", "updated_at", "version"];

use ColumnType::*;

const ADVERTISER: &[Column] = &[
    req("id", Text),
    req("name", Text),
    col("industry", Text),
    col("contact_email", Text),
    col("agency_id", Text),
    col("billing_address", Json),
    req("is_active", Boolean),
    req("version", Integer),
    req("created_at", Timestamp),
    req("updated_at", Timestamp),
];

const AGENCY: &[Column] = &[
    req("id", Text),
    req("name", Text),
    col("contact_email", Text),
    col("commission_rate", Float),
    req("is_active", Boolean),
    req("version", Integer),
    req("created_at", Timestamp),
    req("updated_at", Timestamp),
];

const CAMPAIGN: &[Column] = &[
    req("id", Text),
    req("name", Text),
    req("advertiser_id", Text),
    col("agency_id", Text),
    req("status", Text),
    col("probability", Integer),
    col("budget", Decimal),
    col("start_date", Timestamp),
    col("end_date", Timestamp),
    col("targeting", Json),
    col("notes", Text),
    req("version", Integer),
    req("created_at", Timestamp),
    req("updated_at", Timestamp),
];

const SHOW: &[Column] = &[
    req("id", Text),
    req("name", Text),
    col("category", Text),
    col("youtube_channel_id", Text),
    col("youtube_playlist_id", Text),
    col("rate_card", Json),
    req("is_active", Boolean),
    req("version", Integer),
    req("created_at", Timestamp),
    req("updated_at", Timestamp),
];

const EPISODE: &[Column] = &[
    req("id", Text),
    req("show_id", Text),
    req("title", Text),
    col("episode_number", Integer),
    col("air_date", Timestamp),
    col("duration_seconds", Integer),
    col("youtube_video_id", Text),
    col("youtube_view_count", Integer),
    col("status", Text),
    req("version", Integer),
    req("created_at", Timestamp),
    req("updated_at", Timestamp),
];

const ORDER: &[Column] = &[
    req("id", Text),
    req("order_number", Text),
    req("campaign_id", Text),
    req("status", Text),
    col("total_amount", Decimal),
    col("discount_amount", Decimal),
    col("net_amount", Decimal),
    col("submitted_at", Timestamp),
    col("approved_at", Timestamp),
    req("version", Integer),
    req("created_at", Timestamp),
    req("updated_at", Timestamp),
];

const INVOICE: &[Column] = &[
    req("id", Text),
    req("invoice_number", Text),
    col("order_id", Text),
    col("advertiser_id", Text),
    req("status", Text),
    req("amount", Decimal),
    col("tax_amount", Decimal),
    col("due_date", Timestamp),
    col("paid_at", Timestamp),
    col("line_items", Json),
    req("version", Integer),
    req("created_at", Timestamp),
    req("updated_at", Timestamp),
];

const SCHEDULE: &[Column] = &[
    req("id", Text),
    req("campaign_id", Text),
    req("name", Text),
    req("status", Text),
    col("total_spots", Integer),
    col("total_value", Decimal),
    col("placements", Json),
    col("valid_until", Timestamp),
    req("version", Integer),
    req("created_at", Timestamp),
    req("updated_at", Timestamp),
];

const YOUTUBE_SYNC_JOB: &[Column] = &[
    req("id", Text),
    col("show_id", Text),
    req("sync_type", Text),
    req("status", Text),
    col("pause_reason", Text),
    col("last_synced_at", Timestamp),
    col("items_processed", Integer),
    col("options", Json),
    req("created_at", Timestamp),
    req("updated_at", Timestamp),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Model {
    Advertiser,
    Agency,
    Campaign,
    Show,
    Episode,
    Order,
    Invoice,
    Schedule,
    YoutubeSyncJob,
}

impl Model {
    pub const ALL: [Model; 9] = [
        Model::Advertiser,
        Model::Agency,
        Model::Campaign,
        Model::Show,
        Model::Episode,
        Model::Order,
        Model::Invoice,
        Model::Schedule,
        Model::YoutubeSyncJob,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Model::Advertiser => "advertiser",
            Model::Agency => "agency",
            Model::Campaign => "campaign",
            Model::Show => "show",
            Model::Episode => "episode",
            Model::Order => "order",
            Model::Invoice => "invoice",
            Model::Schedule => "schedule",
            Model::YoutubeSyncJob => "youtubeSyncJob",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            Model::Advertiser => "advertisers",
            Model::Agency => "agencies",
            Model::Campaign => "campaigns",
            Model::Show => "shows",
            Model::Episode => "episodes",
            Model::Order => "orders",
            Model::Invoice => "invoices",
            Model::Schedule => "schedules",
            Model::YoutubeSyncJob => "youtube_sync_jobs",
        }
    }

    pub fn columns(&self) -> &'static [Column] {
        match self {
            Model::Advertiser => ADVERTISER,
            Model::Agency => AGENCY,
            Model::Campaign => CAMPAIGN,
            Model::Show => SHOW,
            Model::Episode => EPISODE,
            Model::Order => ORDER,
            Model::Invoice => INVOICE,
            Model::Schedule => SCHEDULE,
            Model::YoutubeSyncJob => YOUTUBE_SYNC_JOB,
        }
    }

    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns().iter().find(|c| c.name == name)
    }

    /// Look up a column or fail with a configuration error
    pub fn require_column(&self, name: &str) -> Result<&'static Column, TenantError> {
        self.column(name).ok_or_else(|| {
            TenantError::configuration(format!("unknown column '{}' on model {}", name, self.name()))
        })
    }

    /// Models carrying an optimistic-concurrency `version` column
    pub fn is_versioned(&self) -> bool {
        self.column("version").is_some()
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Model {
    type Err = TenantError;

    /// Accepts the model name or its table name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Model::ALL
            .into_iter()
            .find(|m| m.name() == s || m.table() == s)
            .ok_or_else(|| TenantError::configuration(format!("unknown model '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_model_has_text_id_and_timestamps() {
        for model in Model::ALL {
            assert_eq!(model.column("id").map(|c| c.kind), Some(ColumnType::Text), "{}", model);
            assert!(model.column("created_at").is_some(), "{}", model);
            assert!(model.column("updated_at").is_some(), "{}", model);
        }
    }

    #[test]
    fn identifiers_are_plain_snake_case() {
        let ok = |s: &str| s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        for model in Model::ALL {
            assert!(ok(model.table()));
            for column in model.columns() {
                assert!(ok(column.name), "{}.{}", model, column.name);
            }
        }
    }

    #[test]
    fn parses_model_and_table_names() {
        assert_eq!("campaign".parse::<Model>().unwrap(), Model::Campaign);
        assert_eq!("youtube_sync_jobs".parse::<Model>().unwrap(), Model::YoutubeSyncJob);
        assert!(matches!("users".parse::<Model>(), Err(TenantError::Configuration(_))));
    }

    #[test]
    fn sync_jobs_are_not_versioned() {
        assert!(!Model::YoutubeSyncJob.is_versioned());
        assert!(Model::Campaign.is_versioned());
    }
}
