//! Session management
//!
//! `SessionManager` issues, resolves and revokes sessions for both services.
//! Two strategies are supported:
//!
//! - `jwt`: the session token is a signed JWT carrying the identity; logout
//!   blacklists its id until it expires.
//! - `database`: the session token is an opaque random string; the session
//!   and its user live in the key-value store through `SessionAdapter`, and
//!   the expiry slides forward once the session is older than the update age.

use chrono::{DateTime, Duration, Utc};
use rand::{Rng, distributions::Alphanumeric};
use std::{fmt, str::FromStr, sync::Arc};
use tracing::{debug, info, warn};

use crate::{
    adapter::{AdapterUser, SessionAdapter},
    cache::KeyValueStore,
    error::{CacheResult, SessionError, TokenError},
    identity::Identity,
    token::{DEFAULT_MAX_AGE, JwtService, MAX_SESSION_AGE, session_max_age_from_env},
};

/// Default age after which a database session is refreshed: 24 hours
pub const DEFAULT_UPDATE_AGE: u64 = 24 * 60 * 60;

const SESSION_TOKEN_LEN: usize = 64;

/// Where session state lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStrategy {
    Jwt,
    Database,
}

impl FromStr for SessionStrategy {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jwt" => Ok(SessionStrategy::Jwt),
            "database" => Ok(SessionStrategy::Database),
            other => Err(TokenError::Configuration(format!(
                "unknown session strategy: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for SessionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStrategy::Jwt => f.write_str("jwt"),
            SessionStrategy::Database => f.write_str("database"),
        }
    }
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub strategy: SessionStrategy,
    /// Session lifetime in seconds (default: 30 days)
    pub max_age: u64,
    /// Seconds after which a database session is refreshed (default: 24 hours)
    pub update_age: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            strategy: SessionStrategy::Jwt,
            max_age: DEFAULT_MAX_AGE,
            update_age: DEFAULT_UPDATE_AGE,
        }
    }
}

impl SessionConfig {
    /// Create a new SessionConfig from environment variables
    ///
    /// # Environment Variables
    /// - `SESSION_STRATEGY`: `jwt` or `database` (default: jwt)
    /// - `SESSION_MAX_AGE`: Session lifetime in seconds (default: 2592000, at most `MAX_SESSION_AGE`)
    /// - `SESSION_UPDATE_AGE`: Refresh threshold in seconds (default: 86400, capped at the max age)
    pub fn from_env() -> Result<Self, TokenError> {
        let strategy = match std::env::var("SESSION_STRATEGY") {
            Ok(value) => value.parse()?,
            Err(_) => SessionStrategy::Jwt,
        };

        let max_age = session_max_age_from_env()?;

        let update_age = std::env::var("SESSION_UPDATE_AGE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_UPDATE_AGE)
            .min(max_age);

        Ok(SessionConfig {
            strategy,
            max_age,
            update_age,
        })
    }
}

/// A session handed to the client
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires: DateTime<Utc>,
}

/// A session resolved from a presented token
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSession {
    pub identity: Identity,
    pub expires: DateTime<Utc>,
}

/// Session manager shared by request handlers
#[derive(Clone)]
pub struct SessionManager {
    config: SessionConfig,
    jwt_service: JwtService,
    adapter: SessionAdapter,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(config: SessionConfig, jwt_service: JwtService, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            config,
            jwt_service,
            adapter: SessionAdapter::new(store),
        }
    }

    pub fn strategy(&self) -> SessionStrategy {
        self.config.strategy
    }

    /// Session lifetime in seconds
    pub fn max_age(&self) -> u64 {
        self.config.max_age
    }

    pub fn adapter(&self) -> &SessionAdapter {
        &self.adapter
    }

    /// Issue a session for a verified identity
    pub async fn issue(&self, identity: &Identity) -> Result<IssuedSession, SessionError> {
        match self.config.strategy {
            SessionStrategy::Jwt => {
                let issued = self.jwt_service.issue(identity)?;
                Ok(IssuedSession {
                    expires: issued.claims.expires(),
                    token: issued.token,
                })
            }
            SessionStrategy::Database => {
                let mut user = AdapterUser::from(identity);
                if let Some(existing) = self.adapter.get_user(&identity.id).await? {
                    user.email_verified = existing.email_verified;
                }
                self.adapter.update_user(&user).await?;

                let token = generate_session_token();
                let expires = Utc::now() + self.lifetime();
                let session = self
                    .adapter
                    .create_session(&token, &identity.id, expires)
                    .await?
                    .ok_or_else(|| SessionError::UnknownUser(identity.id.clone()))?;

                info!("Created database session for user {}", identity.id);
                Ok(IssuedSession {
                    token: session.session_token,
                    expires: session.expires,
                })
            }
        }
    }

    /// Resolve a presented token; invalid, expired and revoked tokens yield `None`
    pub async fn resolve(&self, token: &str) -> CacheResult<Option<ActiveSession>> {
        match self.config.strategy {
            SessionStrategy::Jwt => {
                let claims = match self.jwt_service.validate_token(token) {
                    Ok(claims) => claims,
                    Err(e) => {
                        debug!("Rejected session token: {}", e);
                        return Ok(None);
                    }
                };

                if self
                    .jwt_service
                    .is_token_blacklisted(self.adapter.store(), &claims.jti)
                    .await?
                {
                    debug!("Rejected revoked session token for user {}", claims.sub);
                    return Ok(None);
                }

                Ok(Some(ActiveSession {
                    identity: claims.identity(),
                    expires: claims.expires(),
                }))
            }
            SessionStrategy::Database => {
                let Some(found) = self.adapter.get_session_and_user(token).await? else {
                    return Ok(None);
                };

                let mut expires = found.session.expires;
                if let Some(refreshed) = self.refreshed_expiry(expires, Utc::now()) {
                    match self
                        .adapter
                        .update_session(token, &found.session.user_id, refreshed)
                        .await?
                    {
                        Some(session) => expires = session.expires,
                        // deleted concurrently, e.g. by logout
                        None => return Ok(None),
                    }
                }

                Ok(Some(ActiveSession {
                    identity: found.user.identity(),
                    expires,
                }))
            }
        }
    }

    /// Terminate the session behind a token; unknown tokens are ignored
    pub async fn revoke(&self, token: &str) -> CacheResult<()> {
        match self.config.strategy {
            SessionStrategy::Jwt => match self.jwt_service.validate_token(token) {
                Ok(claims) => {
                    self.jwt_service
                        .blacklist_token(self.adapter.store(), &claims)
                        .await?;
                    info!("Revoked session token for user {}", claims.sub);
                    Ok(())
                }
                Err(e) => {
                    warn!("Ignoring revocation of invalid session token: {}", e);
                    Ok(())
                }
            },
            SessionStrategy::Database => self.adapter.delete_session(token).await,
        }
    }

    fn lifetime(&self) -> Duration {
        Duration::seconds(self.config.max_age.min(MAX_SESSION_AGE) as i64)
    }

    /// New expiry for a session old enough to be refreshed
    fn refreshed_expiry(&self, expires: DateTime<Utc>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let max_age = self.lifetime();
        let update_age = Duration::seconds(self.config.update_age.min(MAX_SESSION_AGE) as i64);
        let issued_at = expires - max_age;

        (now - issued_at >= update_age).then(|| now + max_age)
    }

    /// Check that the session store is reachable
    pub async fn health_check(&self) -> CacheResult<bool> {
        self.adapter.store().health_check().await
    }
}

/// Random opaque session token
pub fn generate_session_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LEN)
        .map(char::from)
        .collect()
}
