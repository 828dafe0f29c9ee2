use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TenantError;
use crate::types::SchemaName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Master,
    Admin,
    Sales,
    Producer,
    Talent,
    Client,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Master => "master",
            UserRole::Admin => "admin",
            UserRole::Sales => "sales",
            UserRole::Producer => "producer",
            UserRole::Talent => "talent",
            UserRole::Client => "client",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = TenantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "master" => Ok(UserRole::Master),
            "admin" => Ok(UserRole::Admin),
            "sales" => Ok(UserRole::Sales),
            "producer" => Ok(UserRole::Producer),
            "talent" => Ok(UserRole::Talent),
            "client" => Ok(UserRole::Client),
            other => Err(TenantError::invalid_value(format!("Unknown user role: {}", other))),
        }
    }
}

/// The principal behind one request. Built upstream from a validated session
/// and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "ContextFields")]
pub struct TenantContext {
    user_id: String,
    organization_id: String,
    organization_slug: String,
    schema_name: SchemaName,
    role: UserRole,
    is_master: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContextFields {
    user_id: String,
    organization_id: String,
    organization_slug: String,
    schema_name: SchemaName,
    role: UserRole,
}

impl From<ContextFields> for TenantContext {
    fn from(f: ContextFields) -> Self {
        TenantContext::new(f.user_id, f.organization_id, f.organization_slug, f.schema_name, f.role)
    }
}

impl TenantContext {
    pub fn new(
        user_id: impl Into<String>,
        organization_id: impl Into<String>,
        organization_slug: impl Into<String>,
        schema_name: SchemaName,
        role: UserRole,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            organization_id: organization_id.into(),
            organization_slug: organization_slug.into(),
            schema_name,
            role,
            is_master: role == UserRole::Master,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }

    pub fn organization_slug(&self) -> &str {
        &self.organization_slug
    }

    pub fn schema_name(&self) -> &SchemaName {
        &self.schema_name
    }

    pub fn role(&self) -> UserRole {
        self.role
    }

    pub fn is_master(&self) -> bool {
        self.is_master
    }
}
