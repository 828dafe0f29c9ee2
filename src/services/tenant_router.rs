//! Routes one operation to exactly one tenant schema.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::database::executor::{QueryExecutor, QueryOutput};
use crate::database::models::Model;
use crate::database::query_builder::{QueryBuilder, Statement};
use crate::error::TenantError;
use crate::filter::QueryArgs;
use crate::services::access_validator::{AccessTarget, AccessValidator};
use crate::services::context::TenantContext;
use crate::services::schema_resolver::SchemaResolver;
use crate::types::{Operation, SchemaName};

#[derive(Clone)]
pub struct TenantQueryRouter {
    resolver: SchemaResolver,
    validator: AccessValidator,
    builder: QueryBuilder,
    executor: Arc<dyn QueryExecutor>,
}

impl TenantQueryRouter {
    pub fn new(
        resolver: SchemaResolver,
        validator: AccessValidator,
        builder: QueryBuilder,
        executor: Arc<dyn QueryExecutor>,
    ) -> Self {
        Self {
            resolver,
            validator,
            builder,
            executor,
        }
    }

    pub fn resolver(&self) -> &SchemaResolver {
        &self.resolver
    }

    /// Run `operation` on `model` for the caller.
    ///
    /// Without a target the caller's own schema is used and nothing is
    /// audited; that schema must be the one named by the context's slug. With a target the organization is resolved and authorized
    /// first; a denial surfaces as `Unauthorized` after the audit row lands.
    pub async fn execute(
        &self,
        context: &TenantContext,
        target: Option<&str>,
        model: Model,
        operation: Operation,
        args: &QueryArgs,
    ) -> Result<QueryOutput, TenantError> {
        let schema = match target {
            None => self.own_schema(context)?,
            Some(target) => {
                let (organization, schema) = self.resolver.resolve_organization(target).await?;
                let decision = self
                    .validator
                    .authorize_operation(
                        context,
                        &organization.id,
                        AccessTarget {
                            schema: Some(&schema),
                            operation: Some(operation),
                            model: Some(model),
                        },
                    )
                    .await?;
                if !decision.allowed {
                    return Err(TenantError::unauthorized(
                        decision.reason.unwrap_or_else(|| "access denied".to_string()),
                    ));
                }
                schema
            }
        };

        self.execute_in_schema(&schema, model, operation, args).await
    }

    fn own_schema(&self, context: &TenantContext) -> Result<SchemaName, TenantError> {
        let expected = self.resolver.schema_for_slug(context.organization_slug())?;
        if &expected != context.schema_name() {
            warn!(
                user_id = context.user_id(),
                organization_id = context.organization_id(),
                claimed_schema = %context.schema_name(),
                expected_schema = %expected,
                "Tenant context schema does not match its organization"
            );
            return Err(TenantError::unauthorized("tenant context schema does not match its organization"));
        }
        Ok(expected)
    }

    /// Build and run against an already authorized schema
    pub async fn execute_in_schema(
        &self,
        schema: &SchemaName,
        model: Model,
        operation: Operation,
        args: &QueryArgs,
    ) -> Result<QueryOutput, TenantError> {
        let statement = self.builder.build(schema, model, operation, args)?;
        debug!(schema = %schema, model = %model, operation = %operation, "Routing statement");
        self.run(&statement).await
    }

    async fn run(&self, statement: &Statement) -> Result<QueryOutput, TenantError> {
        let rows = self
            .executor
            .run(statement)
            .await
            .map_err(|source| TenantError::Query {
                model: statement.model,
                operation: statement.operation,
                source,
            })?;

        if let Some(expected) = statement.expected_version {
            if rows.is_empty() {
                return Err(TenantError::VersionConflict {
                    model: statement.model,
                    expected,
                });
            }
        }

        Ok(QueryOutput::from_rows(statement.operation, rows))
    }
}
