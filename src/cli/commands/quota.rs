use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::quota::types::ResetMode;
use crate::quota::youtube::Endpoint;
use crate::runtime::Services;

#[derive(Subcommand)]
pub enum QuotaCommands {
    #[command(about = "Show today's usage and whether a call would fit")]
    Status {
        #[arg(help = "Organization slug or id")]
        organization: String,

        #[arg(long, default_value_t = 0, help = "Cost of the call to check")]
        cost: i64,
    },

    #[command(about = "Debit the cost of one YouTube API call")]
    Record {
        #[arg(help = "Organization slug or id")]
        organization: String,

        #[arg(help = "Endpoint name (e.g. search.list) or custom:<cost>")]
        endpoint: String,
    },

    #[command(about = "Reset today's usage and lift a quota pause")]
    Reset {
        #[arg(help = "Organization slug or id")]
        organization: String,

        #[arg(long, help = "Run the midnight rollover instead: keep units already used today")]
        keep_usage: bool,
    },

    #[command(about = "Show the organization's quota configuration")]
    Config {
        #[arg(help = "Organization slug or id")]
        organization: String,
    },
}

pub async fn handle(cmd: QuotaCommands, services: &Services, output_format: OutputFormat) -> anyhow::Result<()> {
    let ledger = &services.ledger;
    match cmd {
        QuotaCommands::Status { organization, cost } => {
            let check = ledger.check_quota(&organization, cost).await?;
            let state = ledger.state(&organization).await?;
            let mut value = serde_json::to_value(&check)?;
            value["state"] = json!(state);
            output_fields(&output_format, &value)
        }
        QuotaCommands::Record { organization, endpoint } => {
            let endpoint: Endpoint = endpoint.parse()?;
            let receipt = ledger.record_usage(&organization, endpoint.cost()).await?;
            output_success(
                &output_format,
                &format!(
                    "Recorded {} ({} units): {} used, {} remaining",
                    endpoint,
                    endpoint.cost(),
                    receipt.new_usage,
                    receipt.remaining
                ),
                Some(serde_json::to_value(&receipt)?),
            )
        }
        QuotaCommands::Reset { organization, keep_usage } => {
            let mode = if keep_usage { ResetMode::Rollover } else { ResetMode::Clear };
            let outcome = ledger.reset_organization(&organization, mode).await?;
            output_success(
                &output_format,
                &format!(
                    "Reset {} for {}: {} used, pause cleared = {}, jobs resumed = {}",
                    outcome.organization_id,
                    outcome.usage_date,
                    outcome.used_units,
                    outcome.pause_cleared,
                    outcome.jobs_resumed
                ),
                Some(serde_json::to_value(&outcome)?),
            )
        }
        QuotaCommands::Config { organization } => {
            let profile = ledger.profile(&organization).await?;
            let config = ledger.store().config(&profile.organization_id).await?;
            let value = json!({
                "organizationId": profile.organization_id,
                "dailyLimit": profile.daily_limit,
                "timezone": profile.timezone.name(),
                "configured": config.is_some(),
                "apiKeyFingerprint": config.as_ref().and_then(|c| c.api_key_fingerprint()),
                "oauthClientId": config.as_ref().and_then(|c| c.oauth_client_id.clone()),
            });
            output_fields(&output_format, &value)
        }
    }
}
