use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod error;
mod models;
mod repositories;
mod routes;
mod state;

use common::{
    cache,
    cookie::CookieConfig,
    database::{self, DatabaseConfig, init_pool},
    middleware::SessionGuard,
    session::{SessionConfig, SessionManager},
    settings::ServerSettings,
    token::{JwtConfig, JwtService},
};
use tokio::net::TcpListener;

use crate::{
    repositories::{AppointmentRepository, ClientRepository, SaleRepository},
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting API service");

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    // Sessions are resolved against the same store the auth service writes to
    let store = cache::connect(&cache::RedisConfig::from_env()?).await?;
    let jwt_service = JwtService::new(JwtConfig::from_env()?)?;
    let sessions = SessionManager::new(SessionConfig::from_env()?, jwt_service, store);

    let app_state = AppState {
        db_pool: pool.clone(),
        guard: SessionGuard {
            sessions,
            cookies: CookieConfig::from_env(),
        },
        appointments: Arc::new(AppointmentRepository::new(pool.clone())),
        sales: Arc::new(SaleRepository::new(pool.clone())),
        clients: Arc::new(ClientRepository::new(pool.clone())),
    };

    info!("API service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let settings = ServerSettings::load("API", 3001)?;
    let listener = TcpListener::bind(settings.address()).await?;
    info!("API service listening on {}", settings.address());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    info!("API service stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
