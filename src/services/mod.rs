pub mod access_validator;
pub mod audit_log;
pub mod context;
pub mod schema_resolver;
pub mod tenant_router;

pub use access_validator::{AccessDecision, AccessTarget, AccessValidator};
pub use audit_log::{AuditSink, PgAuditLog, TenantAccessLogEntry};
pub use context::{TenantContext, UserRole};
pub use schema_resolver::{Organization, OrganizationDirectory, PgOrganizationDirectory, SchemaResolver};
pub use tenant_router::TenantQueryRouter;
