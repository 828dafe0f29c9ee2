use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::database::schema::bootstrap_shared_schema;
use crate::runtime::Services;

pub async fn handle(services: &Services, output_format: OutputFormat) -> anyhow::Result<()> {
    bootstrap_shared_schema(services.database.pool(), &services.shared_schema).await?;
    output_success(
        &output_format,
        &format!("Shared schema '{}' is ready", services.shared_schema),
        Some(json!({ "schema": services.shared_schema })),
    )
}
