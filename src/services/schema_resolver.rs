//! Maps an organization slug or id to its schema name.

use async_trait::async_trait;
use chrono_tz::Tz;
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::warn;

use crate::error::TenantError;
use crate::types::SchemaName;

/// Row of the shared organizations registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Organization {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub timezone: Tz,
}

/// Read access to the organizations registry
#[async_trait]
pub trait OrganizationDirectory: Send + Sync {
    /// Look an organization up by slug or id
    async fn find(&self, slug_or_id: &str) -> Result<Option<Organization>, TenantError>;

    async fn list(&self) -> Result<Vec<Organization>, TenantError>;
}

pub struct PgOrganizationDirectory {
    pool: PgPool,
    table: String,
}

impl PgOrganizationDirectory {
    pub fn new(pool: PgPool, shared: &SchemaName) -> Self {
        Self {
            pool,
            table: shared.qualify("organizations"),
        }
    }

    fn to_organization((id, slug, name, timezone): (String, String, String, String)) -> Organization {
        let timezone = timezone.parse::<Tz>().unwrap_or_else(|_| {
            warn!(organization_id = %id, "Unknown timezone '{}', using UTC", timezone);
            Tz::UTC
        });
        Organization { id, slug, name, timezone }
    }
}

#[async_trait]
impl OrganizationDirectory for PgOrganizationDirectory {
    async fn find(&self, slug_or_id: &str) -> Result<Option<Organization>, TenantError> {
        let sql = format!(
            "SELECT \"id\", \"slug\", \"name\", \"timezone\" FROM {} WHERE \"id\" = $1 OR \"slug\" = $1 ORDER BY (\"id\" = $1) DESC LIMIT 1",
            self.table
        );
        let row: Option<(String, String, String, String)> = sqlx::query_as(&sql)
            .bind(slug_or_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| TenantError::store("looking up organization", e))?;
        Ok(row.map(Self::to_organization))
    }

    async fn list(&self) -> Result<Vec<Organization>, TenantError> {
        let sql = format!(
            "SELECT \"id\", \"slug\", \"name\", \"timezone\" FROM {} ORDER BY \"slug\"",
            self.table
        );
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| TenantError::store("listing organizations", e))?;
        Ok(rows.into_iter().map(Self::to_organization).collect())
    }
}

/// `prefix` + slug, lowercased, hyphens replaced with underscores
pub fn schema_name_for(prefix: &str, slug: &str) -> Result<SchemaName, TenantError> {
    SchemaName::new(format!("{}{}", prefix, slug.to_lowercase().replace('-', "_")))
}

#[derive(Clone)]
pub struct SchemaResolver {
    directory: Arc<dyn OrganizationDirectory>,
    prefix: String,
}

impl SchemaResolver {
    pub fn new(directory: Arc<dyn OrganizationDirectory>, prefix: impl Into<String>) -> Self {
        Self {
            directory,
            prefix: prefix.into(),
        }
    }

    pub fn directory(&self) -> &Arc<dyn OrganizationDirectory> {
        &self.directory
    }

    pub async fn organization(&self, slug_or_id: &str) -> Result<Organization, TenantError> {
        self.directory
            .find(slug_or_id)
            .await?
            .ok_or_else(|| TenantError::not_found(format!("organization '{}'", slug_or_id)))
    }

    pub fn schema_for(&self, organization: &Organization) -> Result<SchemaName, TenantError> {
        self.schema_for_slug(&organization.slug)
    }

    /// Schema name for a slug, without a registry lookup
    pub fn schema_for_slug(&self, slug: &str) -> Result<SchemaName, TenantError> {
        schema_name_for(&self.prefix, slug)
    }

    pub async fn resolve(&self, slug_or_id: &str) -> Result<SchemaName, TenantError> {
        let organization = self.organization(slug_or_id).await?;
        self.schema_for(&organization)
    }

    /// Resolve to both the registry row and its schema
    pub async fn resolve_organization(
        &self,
        slug_or_id: &str,
    ) -> Result<(Organization, SchemaName), TenantError> {
        let organization = self.organization(slug_or_id).await?;
        let schema = self.schema_for(&organization)?;
        Ok((organization, schema))
    }
}
