use clap::Subcommand;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::runtime::Services;

#[derive(Subcommand)]
pub enum AuditCommands {
    #[command(about = "List recent cross-tenant access attempts")]
    List {
        #[arg(long, help = "Only entries for this accessed organization id")]
        organization: Option<String>,

        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
}

pub async fn handle(cmd: AuditCommands, services: &Services, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        AuditCommands::List { organization, limit } => {
            let entries = services.audit.recent(organization.as_deref(), limit).await?;
            if entries.is_empty() {
                return output_empty_collection(&output_format, "entries", "No cross-tenant access recorded");
            }

            match output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "entries": entries }))?);
                }
                OutputFormat::Text => {
                    println!(
                        "{:<20} {:<8} {:<16} {:<10} {:<20} {:<22} {}",
                        "TIME", "ALLOWED", "USER", "ROLE", "ORGANIZATION", "TARGET", "REASON"
                    );
                    println!("{}", "-".repeat(110));
                    for e in &entries {
                        let target = match (&e.model, &e.operation) {
                            (Some(model), Some(op)) => format!("{}.{}", model, op),
                            _ => e.accessed_schema.clone().unwrap_or_else(|| "-".to_string()),
                        };
                        println!(
                            "{:<20} {:<8} {:<16} {:<10} {:<20} {:<22} {}",
                            e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                            if e.allowed { "yes" } else { "NO" },
                            e.user_id,
                            e.user_role,
                            e.accessed_org_id,
                            target,
                            e.reason.as_deref().unwrap_or("-")
                        );
                    }
                }
            }
            Ok(())
        }
    }
}
