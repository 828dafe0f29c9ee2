//! Decides whether a principal may touch a target organization's schema.
//!
//! Master principals are always allowed. Their cross-tenant accesses are
//! recorded. Everyone else is confined to their own organization and every
//! denial is recorded. A failed audit write fails the authorization.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::database::models::Model;
use crate::error::TenantError;
use crate::services::audit_log::{AuditSink, TenantAccessLogEntry};
use crate::services::context::TenantContext;
use crate::types::{Operation, SchemaName};

pub const CROSS_TENANT_DENIED: &str = "unauthorized cross-tenant access";
pub const MASTER_CROSS_TENANT: &str = "master cross-tenant access";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AccessDecision {
    fn allow() -> Self {
        Self { allowed: true, reason: None }
    }
}

/// What the caller intends to do once access is granted
#[derive(Debug, Clone, Default)]
pub struct AccessTarget<'a> {
    pub schema: Option<&'a SchemaName>,
    pub operation: Option<Operation>,
    pub model: Option<Model>,
}

#[derive(Clone)]
pub struct AccessValidator {
    audit: Arc<dyn AuditSink>,
}

impl AccessValidator {
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self { audit }
    }

    pub async fn authorize(
        &self,
        context: &TenantContext,
        target_org_id: &str,
    ) -> Result<AccessDecision, TenantError> {
        self.authorize_operation(context, target_org_id, AccessTarget::default()).await
    }

    pub async fn authorize_operation(
        &self,
        context: &TenantContext,
        target_org_id: &str,
        target: AccessTarget<'_>,
    ) -> Result<AccessDecision, TenantError> {
        let same_org = target_org_id == context.organization_id();

        if context.is_master() {
            if !same_org {
                info!(
                    user_id = context.user_id(),
                    organization_id = target_org_id,
                    "Master cross-tenant access"
                );
                self.log(context, target_org_id, &target, true, MASTER_CROSS_TENANT).await?;
            }
            return Ok(AccessDecision::allow());
        }

        if same_org {
            return Ok(AccessDecision::allow());
        }

        warn!(
            user_id = context.user_id(),
            user_role = %context.role(),
            organization_id = target_org_id,
            "Denied cross-tenant access"
        );
        self.log(context, target_org_id, &target, false, CROSS_TENANT_DENIED).await?;
        Ok(AccessDecision {
            allowed: false,
            reason: Some(CROSS_TENANT_DENIED.to_string()),
        })
    }

    async fn log(
        &self,
        context: &TenantContext,
        target_org_id: &str,
        target: &AccessTarget<'_>,
        allowed: bool,
        reason: &str,
    ) -> Result<(), TenantError> {
        let entry = TenantAccessLogEntry {
            user_id: context.user_id().to_string(),
            user_role: context.role(),
            accessed_org_id: target_org_id.to_string(),
            accessed_schema: target.schema.map(|s| s.to_string()),
            operation: target.operation.map(|o| o.as_str().to_string()),
            model: target.model.map(|m| m.name().to_string()),
            timestamp: Utc::now(),
            allowed,
            reason: Some(reason.to_string()),
        };
        self.audit.record(&entry).await
    }
}
