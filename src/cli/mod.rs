pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::config;
use crate::database::manager::DatabaseManager;
use crate::runtime::Services;

#[derive(Parser)]
#[command(name = "tenantctl")]
#[command(about = "Operator CLI for tenant schemas, YouTube quota and the cross-tenant audit log")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create the shared registry, audit, quota and notification tables")]
    Bootstrap,

    #[command(about = "Tenant schema routing and provisioning")]
    Schema {
        #[command(subcommand)]
        cmd: commands::schema::SchemaCommands,
    },

    #[command(about = "YouTube quota ledger")]
    Quota {
        #[command(subcommand)]
        cmd: commands::quota::QuotaCommands,
    },

    #[command(about = "Cross-tenant access audit log")]
    Audit {
        #[command(subcommand)]
        cmd: commands::audit::AuditCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Connect using `DATABASE_URL` and wire the services
pub async fn connect() -> anyhow::Result<Services> {
    let config = config();
    let database = DatabaseManager::connect(&config.database).await?;
    Ok(Services::new(database, config)?)
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let services = connect().await?;

    let result = match cli.command {
        Commands::Bootstrap => commands::bootstrap::handle(&services, output_format).await,
        Commands::Schema { cmd } => commands::schema::handle(cmd, &services, output_format).await,
        Commands::Quota { cmd } => commands::quota::handle(cmd, &services, output_format).await,
        Commands::Audit { cmd } => commands::audit::handle(cmd, &services, output_format).await,
    };

    services.database.close().await;
    result
}
