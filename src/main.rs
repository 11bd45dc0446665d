//! tripdesk - Back-office content service for a travel agency website

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tripdesk::{
    api::{self, AppState, RequestStats},
    cache::create_cache,
    config::Config,
    db::{
        self,
        repositories::{SqlxContentRepository, SqlxDraftRepository, SqlxListingRepository},
    },
    services::{ContentService, DraftService, ImportService, PackageService},
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tripdesk=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting tripdesk...");

    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    if config.admin.is_open() {
        tracing::warn!("No admin tokens configured: admin routes are open");
    }

    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let cache = create_cache(&config.cache);
    tracing::info!(
        "Cache initialized (ttl {}s, capacity {})",
        config.cache.ttl_seconds,
        config.cache.max_capacity
    );

    let package_service = Arc::new(PackageService::new(
        SqlxListingRepository::boxed(pool.clone()),
        cache.clone(),
    ));
    let content_service = Arc::new(ContentService::new(
        SqlxContentRepository::boxed(pool.clone()),
        cache,
    ));
    let draft_service = Arc::new(DraftService::new(
        SqlxDraftRepository::boxed(pool.clone()),
        content_service.clone(),
    ));
    let import_service = Arc::new(ImportService::new(
        content_service.clone(),
        config.import.clone(),
    ));

    let state = AppState {
        pool: pool.clone(),
        content_service,
        package_service,
        draft_service,
        import_service,
        admin: Arc::new(config.admin.clone()),
        request_stats: Arc::new(RequestStats::new()),
    };

    let app = api::build_router(state, &config.server.cors_origin);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
