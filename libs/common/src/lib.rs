//! Common library for the Vanity Hub services
//!
//! This crate provides the pieces shared by the auth and api services:
//! database and key-value connectivity, the caller identity model, session
//! issuance and resolution, the session cookie, phone normalization and the
//! location access filter.

pub mod access;
pub mod adapter;
pub mod cache;
pub mod cookie;
pub mod database;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod phone;
pub mod session;
pub mod settings;
pub mod token;

/// Example usage of the session manager
///
/// ```rust,no_run
/// use common::cache::{RedisConfig, connect};
/// use common::session::{SessionConfig, SessionManager};
/// use common::token::{JwtConfig, JwtService};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = connect(&RedisConfig::from_env()?).await?;
///     let jwt_service = JwtService::new(JwtConfig::from_env()?)?;
///     let sessions = SessionManager::new(SessionConfig::from_env()?, jwt_service, store);
///     let session = sessions.resolve("token-from-cookie").await?;
///     println!("Authenticated: {}", session.is_some());
///     Ok(())
/// }
/// ```
pub fn example_usage() {}
