use anyhow::Context;
use tracing_subscriber::EnvFilter;

use adops_tenancy::api;
use adops_tenancy::config::config;
use adops_tenancy::database::manager::DatabaseManager;
use adops_tenancy::database::schema::bootstrap_shared_schema;
use adops_tenancy::runtime::Services;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL and friends
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config();
    tracing::info!("Starting adops-tenancy in {:?} mode", config.environment);
    if adops_tenancy::is_production!() && config.api.enable_cors {
        tracing::warn!("Permissive CORS is enabled in production");
    }

    let database = DatabaseManager::connect(&config.database)
        .await
        .context("connecting to database")?;
    let services = Services::new(database, config)?;
    bootstrap_shared_schema(services.database.pool(), &services.shared_schema).await?;

    let scheduler = std::sync::Arc::new(services.scheduler());
    tokio::spawn(scheduler.run());

    let app = api::app(services.app_state(), config.api.enable_cors);

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    services.database.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
