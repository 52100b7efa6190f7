//! Folio - filter taxonomy and filtered article service

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use folio::{
    api::{self, AppState},
    cache::create_cache,
    config::Config,
    db::{
        self,
        repositories::{SqlxFilterRepository, SqlxSessionRepository, SqlxUserRepository},
    },
    services::{AuthService, FilterService, FilteredArticleService},
};

/// How often expired sessions are swept
const SESSION_PURGE_INTERVAL_SECS: u64 = 3600;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Folio...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!(applied, "Database migrations completed");

    // Initialize cache
    let cache = create_cache(&config.cache);
    tracing::info!("Cache initialized");

    // Create repositories
    let filter_repo = SqlxFilterRepository::boxed(pool.clone());
    let session_repo = SqlxSessionRepository::boxed(pool.clone());
    let user_repo = SqlxUserRepository::boxed(pool.clone());

    // Initialize services
    let filter_service = Arc::new(FilterService::new(filter_repo.clone(), cache));
    let filtered_articles = Arc::new(FilteredArticleService::new(
        filter_service.clone(),
        filter_repo,
        config.filters.clone(),
    ));
    let auth_service = Arc::new(AuthService::new(session_repo, user_repo));

    // Expired session cleanup
    {
        let auth = auth_service.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_secs(SESSION_PURGE_INTERVAL_SECS));
            loop {
                interval.tick().await;
                if let Err(e) = auth.purge_expired().await {
                    tracing::warn!("Failed to purge expired sessions: {}", e);
                }
            }
        });
    }

    let state = AppState {
        filter_service,
        filtered_articles,
        auth_service,
    };

    // Build router
    let app = api::build_router(state, &config.server.cors_origin)?;

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
