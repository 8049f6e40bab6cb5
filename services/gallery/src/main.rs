use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::database::{DatabaseConfig, health_check, init_pool};
use gallery::{
    AppState,
    config::{ApiConfig, StoreBackend},
    middleware::AdminAuthConfig,
    repositories::{MediaStore, MemoryMediaStore, PgMediaStore},
    routes, share,
};

async fn connect_store(backend: StoreBackend) -> Result<Arc<dyn MediaStore>> {
    match backend {
        StoreBackend::Postgres => {
            let db_config = DatabaseConfig::from_env()?;
            let pool = init_pool(&db_config).await?;

            if health_check(&pool).await? {
                info!("Database connection successful");
            } else {
                anyhow::bail!("Failed to connect to database");
            }

            let store = PgMediaStore::new(pool);
            store.migrate().await?;
            info!("Database migrations applied");

            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            warn!("Using the in-memory media store; uploads are lost on restart");
            Ok(Arc::new(MemoryMediaStore::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting gallery service");

    let config = ApiConfig::from_env().context("Failed to load gallery configuration")?;
    share::parse_origin(&config.public_origin)
        .with_context(|| format!("Invalid public origin {}", config.public_origin))?;
    let auth = AdminAuthConfig::from_env().map_err(anyhow::Error::msg)?;

    let store = connect_store(config.store_backend).await?;
    let bind_addr = config.bind_addr.clone();
    let app = routes::create_router(AppState::new(store, config, auth));

    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Gallery service listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gallery service stopped");
    Ok(())
}
