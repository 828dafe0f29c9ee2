//! HTTP surface of the tenant router and quota ledger.

pub mod error;
pub mod handlers;
pub mod response;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::database::manager::DatabaseManager;
use crate::quota::ledger::QuotaLedger;
use crate::services::access_validator::AccessValidator;
use crate::services::audit_log::AuditSink;
use crate::services::tenant_router::TenantQueryRouter;

pub use error::ApiError;
pub use response::{ApiResponse, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub router: TenantQueryRouter,
    pub validator: AccessValidator,
    pub audit: Arc<dyn AuditSink>,
    pub ledger: Arc<QuotaLedger>,
    /// Absent when running over in-memory stores
    pub database: Option<DatabaseManager>,
}

pub fn app(state: AppState, enable_cors: bool) -> Router {
    let router = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/query/:model/:operation", post(handlers::query_post))
        .route("/api/quota/:organization", get(handlers::quota_get))
        .route("/api/quota/:organization/reset", post(handlers::quota_reset))
        .route("/api/audit", get(handlers::audit_get))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
