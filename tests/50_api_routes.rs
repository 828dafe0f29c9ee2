mod common;

use adops_tenancy::api::{self, handlers::CONTEXT_HEADER, AppState};
use adops_tenancy::services::UserRole;
use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono_tz::Tz;
use common::{context, Harness};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app(h: &Harness) -> Router {
    api::app(
        AppState {
            router: h.router.clone(),
            validator: h.validator.clone(),
            audit: h.audit.clone(),
            ledger: h.ledger.clone(),
            database: None,
        },
        false,
    )
}

fn harness() -> Harness {
    let h = Harness::new();
    h.organization("org-a", "alpha", Tz::UTC);
    h.organization("org-b", "beta", Tz::UTC);
    h.store.set_limit("org-a", 10_000);
    h
}

async fn send(app: Router, request: Request<Body>) -> Result<(StatusCode, Value)> {
    let response = app.oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
    Ok((status, body))
}

fn with_context(builder: axum::http::request::Builder, role: UserRole) -> axum::http::request::Builder {
    let ctx = context("org-a", "alpha", role);
    builder.header(CONTEXT_HEADER, serde_json::to_string(&ctx).unwrap())
}

fn query_request(model: &str, operation: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/api/query/{}/{}", model, operation))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_without_database_is_ok() -> Result<()> {
    let h = harness();
    let (status, body) = send(app(&h), Request::get("/health").body(Body::empty())?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn query_route_returns_rows_in_envelope() -> Result<()> {
    let h = harness();
    h.executor.reply_with(vec![json!({ "id": "c1", "name": "Spring" }).as_object().cloned().unwrap()]);
    let ctx = context("org-a", "alpha", UserRole::Sales);

    let (status, body) = send(
        app(&h),
        query_request("campaign", "find", json!({ "context": ctx, "args": { "where": { "status": "active" } } })),
    )
    .await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"][0]["name"], "Spring");
    assert!(h.executor.statements()[0].sql.contains("\"org_alpha\".\"campaigns\""));
    Ok(())
}

#[tokio::test]
async fn unknown_model_is_rejected_before_sql() -> Result<()> {
    let h = harness();
    let ctx = context("org-a", "alpha", UserRole::Admin);
    let (status, body) = send(app(&h), query_request("users", "find", json!({ "context": ctx }))).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(h.executor.statements().is_empty());
    Ok(())
}

#[tokio::test]
async fn cross_tenant_query_is_forbidden_and_audited() -> Result<()> {
    let h = harness();
    let ctx = context("org-a", "alpha", UserRole::Client);
    let (status, body) = send(
        app(&h),
        query_request("invoice", "find", json!({ "context": ctx, "organization": "beta" })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
    assert_eq!(h.audit.entries().len(), 1);
    Ok(())
}

#[tokio::test]
async fn quota_check_reports_budget() -> Result<()> {
    let h = harness();
    h.store.set_usage("org-a", h.today(Tz::UTC), 9950);
    let request = with_context(Request::get("/api/quota/alpha?cost=100"), UserRole::Producer).body(Body::empty())?;

    let (status, body) = send(app(&h), request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["allowed"], false);
    assert_eq!(body["data"]["currentUsage"], 9950);
    assert_eq!(body["data"]["remaining"], 50);
    Ok(())
}

#[tokio::test]
async fn quota_routes_require_context() -> Result<()> {
    let h = harness();
    let (status, _) = send(app(&h), Request::get("/api/quota/alpha").body(Body::empty())?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn reset_and_audit_are_master_only() -> Result<()> {
    let h = harness();

    let request = with_context(Request::post("/api/quota/alpha/reset"), UserRole::Admin).body(Body::empty())?;
    let (status, _) = send(app(&h), request).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let request = with_context(Request::get("/api/audit"), UserRole::Admin).body(Body::empty())?;
    let (status, _) = send(app(&h), request).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let request = with_context(Request::post("/api/quota/beta/reset"), UserRole::Master).body(Body::empty())?;
    let (status, body) = send(app(&h), request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["organizationId"], "org-b");
    assert_eq!(body["data"]["mode"], "clear");

    let request = with_context(Request::get("/api/audit?organization=org-b"), UserRole::Master).body(Body::empty())?;
    let (status, body) = send(app(&h), request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(body["data"][0]["accessedOrgId"], "org-b");
    Ok(())
}
