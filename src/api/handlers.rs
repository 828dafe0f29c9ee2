use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::api::error::ApiError;
use crate::api::response::{ApiResponse, ApiResult};
use crate::api::AppState;
use crate::database::executor::QueryOutput;
use crate::database::models::Model;
use crate::filter::QueryArgs;
use crate::quota::types::{QuotaCheck, ResetMode, ResetOutcome};
use crate::services::access_validator::AccessTarget;
use crate::services::audit_log::TenantAccessLogEntry;
use crate::services::context::TenantContext;
use crate::services::schema_resolver::Organization;
use crate::types::Operation;

/// Header carrying the JSON-encoded caller context, set by the upstream
/// session layer
pub const CONTEXT_HEADER: &str = "x-tenant-context";

/// Caller context taken from [`CONTEXT_HEADER`]
pub struct CallerContext(pub TenantContext);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CallerContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(CONTEXT_HEADER)
            .ok_or_else(|| ApiError::unauthorized("missing tenant context"))?
            .to_str()
            .map_err(|_| ApiError::unauthorized("tenant context is not valid UTF-8"))?;
        serde_json::from_str(raw)
            .map(CallerContext)
            .map_err(|e| ApiError::unauthorized(format!("invalid tenant context: {}", e)))
    }
}

fn require_master(context: &TenantContext) -> Result<(), ApiError> {
    if context.is_master() {
        Ok(())
    } else {
        Err(ApiError::forbidden("master role required"))
    }
}

/// Resolve `organization` and check the caller may touch it
async fn authorized_organization(
    state: &AppState,
    context: &TenantContext,
    organization: &str,
) -> Result<Organization, ApiError> {
    let (organization, schema) = state.router.resolver().resolve_organization(organization).await?;
    let decision = state
        .validator
        .authorize_operation(
            context,
            &organization.id,
            AccessTarget {
                schema: Some(&schema),
                ..AccessTarget::default()
            },
        )
        .await?;
    if !decision.allowed {
        return Err(ApiError::forbidden(
            decision.reason.unwrap_or_else(|| "access denied".to_string()),
        ));
    }
    Ok(organization)
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let Some(database) = &state.database else {
        return (StatusCode::OK, Json(json!({ "success": true, "data": { "status": "ok", "timestamp": now } })));
    };

    match database.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "success": true, "data": { "status": "ok", "timestamp": now, "database": "ok" } })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": { "status": "degraded", "timestamp": now }
                })),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub context: TenantContext,
    pub organization: Option<String>,
    #[serde(default)]
    pub args: QueryArgs,
}

/// POST /api/query/:model/:operation
pub async fn query_post(
    State(state): State<AppState>,
    Path((model, operation)): Path<(String, String)>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<QueryOutput> {
    let model: Model = model.parse()?;
    let operation: Operation = operation.parse()?;

    let output = state
        .router
        .execute(
            &request.context,
            request.organization.as_deref(),
            model,
            operation,
            &request.args,
        )
        .await?;

    Ok(match operation {
        Operation::Create => ApiResponse::created(output),
        _ => ApiResponse::success(output),
    })
}

#[derive(Debug, Deserialize)]
pub struct QuotaQuery {
    pub cost: Option<i64>,
}

/// GET /api/quota/:organization?cost=n
pub async fn quota_get(
    State(state): State<AppState>,
    Path(organization): Path<String>,
    Query(query): Query<QuotaQuery>,
    CallerContext(context): CallerContext,
) -> ApiResult<QuotaCheck> {
    let cost = query.cost.unwrap_or(0);
    if cost < 0 {
        return Err(ApiError::bad_request("cost must not be negative"));
    }
    let organization = authorized_organization(&state, &context, &organization).await?;
    let check = state.ledger.check_quota(&organization.id, cost).await?;
    Ok(ApiResponse::success(check))
}

/// POST /api/quota/:organization/reset
pub async fn quota_reset(
    State(state): State<AppState>,
    Path(organization): Path<String>,
    CallerContext(context): CallerContext,
) -> ApiResult<ResetOutcome> {
    require_master(&context)?;
    let organization = authorized_organization(&state, &context, &organization).await?;
    let outcome = state.ledger.reset_organization(&organization.id, ResetMode::Clear).await?;
    Ok(ApiResponse::success(outcome))
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub organization: Option<String>,
    pub limit: Option<i64>,
}

/// GET /api/audit?organization=&limit=
pub async fn audit_get(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
    CallerContext(context): CallerContext,
) -> ApiResult<Vec<TenantAccessLogEntry>> {
    require_master(&context)?;
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    let entries = state.audit.recent(query.organization.as_deref(), limit).await?;
    Ok(ApiResponse::success(entries))
}
