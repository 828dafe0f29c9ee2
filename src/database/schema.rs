//! DDL for the shared namespace and for tenant schemas.
//! Tenant tables are generated from the model allow-list so both stay in step.

use sqlx::PgPool;
use tracing::info;

use crate::database::models::{Column, ColumnType, Model};
use crate::error::TenantError;
use crate::types::SchemaName;

fn column_ddl(column: &Column) -> String {
    let mut ddl = format!("\"{}\" {}", column.name, column.kind.ddl());
    match (column.name, column.kind) {
        ("id", _) => ddl.push_str(" PRIMARY KEY"),
        ("version", _) => ddl.push_str(" NOT NULL DEFAULT 1"),
        ("created_at", _) | ("updated_at", _) => ddl.push_str(" NOT NULL DEFAULT NOW()"),
        (_, ColumnType::Boolean) if !column.nullable => ddl.push_str(" NOT NULL DEFAULT TRUE"),
        _ if !column.nullable => ddl.push_str(" NOT NULL"),
        _ => {}
    }
    ddl
}

pub fn tenant_table_ddl(schema: &SchemaName, model: Model) -> String {
    let columns = model.columns().iter().map(column_ddl).collect::<Vec<_>>().join(",\n    ");
    format!("CREATE TABLE IF NOT EXISTS {} (\n    {}\n)", schema.qualify(model.table()), columns)
}

pub fn shared_schema_ddl(shared: &SchemaName) -> Vec<String> {
    let t = |table: &str| shared.qualify(table);
    vec![
        format!("CREATE SCHEMA IF NOT EXISTS \"{}\"", shared),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
    \"id\" TEXT PRIMARY KEY,
    \"slug\" TEXT NOT NULL UNIQUE,
    \"name\" TEXT NOT NULL,
    \"timezone\" TEXT NOT NULL DEFAULT 'UTC',
    \"youtube_sync_paused\" BOOLEAN NOT NULL DEFAULT FALSE,
    \"youtube_sync_pause_reason\" TEXT,
    \"youtube_sync_paused_at\" TIMESTAMPTZ,
    \"created_at\" TIMESTAMPTZ NOT NULL DEFAULT NOW()
)",
            t("organizations")
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
    \"id\" BIGSERIAL PRIMARY KEY,
    \"user_id\" TEXT NOT NULL,
    \"user_role\" TEXT NOT NULL,
    \"accessed_org_id\" TEXT NOT NULL,
    \"accessed_schema\" TEXT,
    \"operation\" TEXT,
    \"model\" TEXT,
    \"allowed\" BOOLEAN NOT NULL,
    \"reason\" TEXT,
    \"timestamp\" TIMESTAMPTZ NOT NULL DEFAULT NOW()
)",
            t("tenant_access_logs")
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS \"tenant_access_logs_org_idx\" ON {} (\"accessed_org_id\", \"timestamp\" DESC)",
            t("tenant_access_logs")
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
    \"organization_id\" TEXT PRIMARY KEY REFERENCES {} (\"id\") ON DELETE CASCADE,
    \"daily_limit\" BIGINT NOT NULL DEFAULT 10000,
    \"api_key\" TEXT,
    \"oauth_client_id\" TEXT,
    \"oauth_client_secret\" TEXT,
    \"updated_at\" TIMESTAMPTZ NOT NULL DEFAULT NOW()
)",
            t("youtube_quota_configs"),
            t("organizations")
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
    \"organization_id\" TEXT NOT NULL,
    \"usage_date\" DATE NOT NULL,
    \"used_units\" BIGINT NOT NULL DEFAULT 0,
    \"updated_at\" TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (\"organization_id\", \"usage_date\")
)",
            t("youtube_quota_usage")
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
    \"id\" BIGSERIAL PRIMARY KEY,
    \"organization_id\" TEXT NOT NULL,
    \"severity\" TEXT NOT NULL,
    \"kind\" TEXT NOT NULL,
    \"title\" TEXT NOT NULL,
    \"message\" TEXT NOT NULL,
    \"created_at\" TIMESTAMPTZ NOT NULL DEFAULT NOW()
)",
            t("notifications")
        ),
    ]
}

async fn run_all(pool: &PgPool, statements: &[String], context: &str) -> Result<(), TenantError> {
    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| TenantError::store(context.to_string(), e))?;
    }
    Ok(())
}

/// Create the shared registry, audit log, quota and notification tables
pub async fn bootstrap_shared_schema(pool: &PgPool, shared: &SchemaName) -> Result<(), TenantError> {
    run_all(pool, &shared_schema_ddl(shared), "bootstrapping shared schema").await?;
    info!("Shared schema ready: {}", shared);
    Ok(())
}

/// Create an organization schema holding every tenant table
pub async fn provision_tenant_schema(pool: &PgPool, schema: &SchemaName) -> Result<(), TenantError> {
    let mut statements = vec![format!("CREATE SCHEMA IF NOT EXISTS \"{}\"", schema)];
    statements.extend(Model::ALL.iter().map(|m| tenant_table_ddl(schema, *m)));
    run_all(pool, &statements, "provisioning tenant schema").await?;
    info!("Provisioned tenant schema: {}", schema);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_ddl_carries_defaults_for_system_columns() {
        let schema = SchemaName::new("org_acme").unwrap();
        let ddl = tenant_table_ddl(&schema, Model::Advertiser);
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS \"org_acme\".\"advertisers\""));
        assert!(ddl.contains("\"id\" TEXT PRIMARY KEY"));
        assert!(ddl.contains("\"version\" BIGINT NOT NULL DEFAULT 1"));
        assert!(ddl.contains("\"is_active\" BOOLEAN NOT NULL DEFAULT TRUE"));
        assert!(ddl.contains("\"billing_address\" JSONB,") || ddl.contains("\"billing_address\" JSONB\n"));
        assert!(ddl.contains("\"name\" TEXT NOT NULL"));
    }

    #[test]
    fn shared_ddl_is_scoped_to_shared_schema() {
        let shared = SchemaName::new("platform").unwrap();
        let ddl = shared_schema_ddl(&shared);
        assert!(ddl.iter().all(|s| s.contains("\"platform\"")));
        assert!(ddl.iter().any(|s| s.contains("\"platform\".\"youtube_quota_usage\"")));
        assert!(ddl.iter().any(|s| s.contains("PRIMARY KEY (\"organization_id\", \"usage_date\")")));
    }
}
