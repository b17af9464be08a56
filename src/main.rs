use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use portal_api::audit::spawn_retention_sweeper;
use portal_api::config::{AppConfig, RetentionMode};
use portal_api::database::PgConnector;
use portal_api::schema::SchemaCatalog;
use portal_api::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up *_DB_URL, SESSION_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env();
    config.validate().context("invalid configuration")?;
    tracing::info!("Starting Portal API in {:?} mode", config.environment);

    let catalog = match &config.schema_dir {
        Some(dir) => SchemaCatalog::load_dir(dir).with_context(|| format!("loading schemas from {}", dir.display()))?,
        None => SchemaCatalog::builtin().context("loading built-in schemas")?,
    };
    for descriptor in catalog.iter() {
        if config.pool_url(&descriptor.db_pool).is_none() {
            tracing::warn!(slug = %descriptor.slug, pool = %descriptor.db_pool, "Pool not configured");
        }
    }

    let connector = Arc::new(PgConnector::from_config(&config.database));
    let port = config.api.port;
    let state = AppState::new(config, catalog, connector).context("building application state")?;

    let sweeper = (state.audit.is_enabled() && state.audit.mode() == RetentionMode::Scheduled).then(|| {
        spawn_retention_sweeper(state.audit.clone(), Duration::from_secs(state.config.audit.sweep_interval_secs))
    });

    let registry = state.registry.clone();
    let app = app(state);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Portal API listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    registry.close_all().await;
    tracing::info!("Portal API stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!("Failed to listen for SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
