use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::database::models::Model;
use crate::database::schema::provision_tenant_schema;
use crate::runtime::Services;

#[derive(Subcommand)]
pub enum SchemaCommands {
    #[command(about = "Show the schema an organization routes to")]
    Resolve {
        #[arg(help = "Organization slug or id")]
        organization: String,
    },

    #[command(about = "Create an organization's schema and tenant tables")]
    Provision {
        #[arg(help = "Organization slug or id")]
        organization: String,
    },
}

pub async fn handle(cmd: SchemaCommands, services: &Services, output_format: OutputFormat) -> anyhow::Result<()> {
    let resolver = services.router.resolver();
    match cmd {
        SchemaCommands::Resolve { organization } => {
            let (org, schema) = resolver.resolve_organization(&organization).await?;
            match output_format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({
                        "organization": org,
                        "schema": schema
                    }))?
                ),
                OutputFormat::Text => println!("{} ({}) -> {}", org.slug, org.id, schema),
            }
            Ok(())
        }
        SchemaCommands::Provision { organization } => {
            let schema = resolver.resolve(&organization).await?;
            provision_tenant_schema(services.database.pool(), &schema).await?;
            let tables: Vec<_> = Model::ALL.iter().map(|m| m.table()).collect();
            output_success(
                &output_format,
                &format!("Provisioned schema '{}' with {} tables", schema, tables.len()),
                Some(json!({ "schema": schema, "tables": tables })),
            )
        }
    }
}
