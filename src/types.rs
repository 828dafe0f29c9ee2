//! Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TenantError;

/// Operations the query builder accepts.
/// Used by the statement builder, the tenant router and the access audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Find,
    FindOne,
    Create,
    Update,
    Delete,
    Count,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::Find,
        Operation::FindOne,
        Operation::Create,
        Operation::Update,
        Operation::Delete,
        Operation::Count,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Find => "find",
            Operation::FindOne => "findOne",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Count => "count",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = TenantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "find" | "findMany" => Ok(Operation::Find),
            "findOne" | "find_one" | "findFirst" => Ok(Operation::FindOne),
            "create" => Ok(Operation::Create),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            "count" => Ok(Operation::Count),
            other => Err(TenantError::configuration(format!(
                "unsupported operation '{}'",
                other
            ))),
        }
    }
}

/// Validated schema identifier. Only `[a-z0-9_]`, starting with a letter or
/// underscore, at most 63 bytes (the Postgres identifier limit).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaName(String);

impl SchemaName {
    pub fn new(name: impl Into<String>) -> Result<Self, TenantError> {
        let name = name.into();
        if Self::is_valid(&name) {
            Ok(Self(name))
        } else {
            Err(TenantError::configuration(format!("invalid schema name '{}'", name)))
        }
    }

    pub fn is_valid(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(c) if c.is_ascii_lowercase() || c == '_' => {}
            _ => return false,
        }
        name.len() <= 63 && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `"schema"."table"`
    pub fn qualify(&self, table: &str) -> String {
        format!("\"{}\".\"{}\"", self.0, table)
    }
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SchemaName {
    type Error = TenantError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SchemaName::new(value)
    }
}

impl From<SchemaName> for String {
    fn from(value: SchemaName) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_operations() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
        assert_eq!("findMany".parse::<Operation>().unwrap(), Operation::Find);
    }

    #[test]
    fn rejects_unknown_operation_as_configuration_error() {
        let err = "upsert".parse::<Operation>().unwrap_err();
        assert!(matches!(err, TenantError::Configuration(_)));
    }

    #[test]
    fn validates_schema_names() {
        assert!(SchemaName::is_valid("org_acme_media"));
        assert!(SchemaName::is_valid("public"));
        assert!(!SchemaName::is_valid("org-acme"));
        assert!(!SchemaName::is_valid("Org_Acme"));
        assert!(!SchemaName::is_valid("9lives"));
        assert!(!SchemaName::is_valid("org_\"; DROP SCHEMA public"));
        assert!(!SchemaName::is_valid(&"a".repeat(64)));
    }

    #[test]
    fn qualifies_tables() {
        let schema = SchemaName::new("org_acme").unwrap();
        assert_eq!(schema.qualify("campaigns"), "\"org_acme\".\"campaigns\"");
    }
}
