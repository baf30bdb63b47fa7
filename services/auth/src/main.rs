use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod audit;
mod authenticator;
mod models;
mod password;
mod rate_limiter;
mod repositories;
mod routes;
mod validation;

use common::{
    cache,
    cookie::CookieConfig,
    database,
    middleware::SessionGuard,
    session::{SessionConfig, SessionManager},
    settings::ServerSettings,
    token::{JwtConfig, JwtService},
};
use tokio::net::TcpListener;

use crate::{
    audit::TracingAuditSink,
    authenticator::Authenticator,
    rate_limiter::{RateLimiter, RateLimiterConfig},
    repositories::UserRepository,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub authenticator: Authenticator,
    pub guard: SessionGuard,
    pub rate_limiter: RateLimiter,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting authentication service");

    // Initialize database connection pool
    let db_config = database::DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    // Check database connectivity
    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    // Initialize the key-value store
    let redis_config = cache::RedisConfig::from_env()?;
    let store = cache::connect(&redis_config).await?;

    let jwt_service = JwtService::new(JwtConfig::from_env()?)?;
    let session_config = SessionConfig::from_env()?;
    info!("Using {} session strategy", session_config.strategy);

    let rate_limiter = RateLimiter::new(RateLimiterConfig::default());
    let app_state = AppState {
        authenticator: Authenticator::new(
            Arc::new(UserRepository::new(pool.clone())),
            Arc::new(TracingAuditSink),
        ),
        guard: SessionGuard {
            sessions: SessionManager::new(session_config, jwt_service, store),
            cookies: CookieConfig::from_env(),
        },
        rate_limiter: rate_limiter.clone(),
    };

    // Forget stale login attempts periodically
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(600));
        loop {
            interval.tick().await;
            rate_limiter.prune().await;
        }
    });

    // Start the web server
    let app = routes::create_router(app_state);

    let settings = ServerSettings::load("AUTH", 3000)?;
    let listener = TcpListener::bind(settings.address()).await?;
    info!("Authentication service listening on {}", settings.address());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    info!("Authentication service stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
