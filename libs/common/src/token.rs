//! JWT service for session token generation and validation
//!
//! Session tokens are HS256-signed with the shared session secret and carry
//! the caller's identity, so both services can verify them without a lookup.
//! Revoked tokens are blacklisted in the key-value store until they expire.

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::{
    cache::{Expiry, KeyValueStore},
    error::{CacheResult, TokenError},
    identity::{Identity, LocationAccess, Role},
};

/// Default session lifetime: 30 days
pub const DEFAULT_MAX_AGE: u64 = 30 * 24 * 60 * 60;

/// Longest accepted session lifetime: 10 years
pub const MAX_SESSION_AGE: u64 = 10 * 365 * 24 * 60 * 60;

const MIN_SECRET_LEN: usize = 32;

/// Read `SESSION_MAX_AGE`, defaulting to 30 days when unset.
///
/// Values that are not a whole number of seconds between 1 and
/// `MAX_SESSION_AGE` are a configuration error.
pub fn session_max_age_from_env() -> Result<u64, TokenError> {
    let Ok(value) = std::env::var("SESSION_MAX_AGE") else {
        return Ok(DEFAULT_MAX_AGE);
    };

    let max_age = value.trim().parse().map_err(|_| {
        TokenError::Configuration(format!("SESSION_MAX_AGE is not a number of seconds: {}", value))
    })?;
    check_max_age(max_age)?;
    Ok(max_age)
}

pub(crate) fn check_max_age(max_age: u64) -> Result<(), TokenError> {
    if max_age == 0 || max_age > MAX_SESSION_AGE {
        return Err(TokenError::Configuration(format!(
            "session max age must be between 1 and {} seconds, got {}",
            MAX_SESSION_AGE, max_age
        )));
    }
    Ok(())
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared secret for signing tokens
    pub secret: String,
    /// Token lifetime in seconds (default: 30 days)
    pub max_age: u64,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `AUTH_SECRET`: Session-signing secret (required)
    /// - `SESSION_MAX_AGE`: Token lifetime in seconds (default: 2592000, at most `MAX_SESSION_AGE`)
    pub fn from_env() -> Result<Self, TokenError> {
        let secret = std::env::var("AUTH_SECRET").map_err(|_| {
            TokenError::Configuration("AUTH_SECRET environment variable not set".to_string())
        })?;

        let max_age = session_max_age_from_env()?;

        Ok(JwtConfig { secret, max_age })
    }
}

/// JWT claims structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Location-access list, `["all"]` for administrators
    pub locations: LocationAccess,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
    /// Token id, used for revocation
    pub jti: String,
}

impl Claims {
    /// Identity carried by the token
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.sub.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            locations: self.locations.clone(),
        }
    }

    /// Expiry as a timestamp
    pub fn expires(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp as i64, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

/// A freshly signed token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Result<Self, TokenError> {
        if config.secret.is_empty() {
            return Err(TokenError::Configuration(
                "session secret must not be empty".to_string(),
            ));
        }
        check_max_age(config.max_age)?;
        if config.secret.len() < MIN_SECRET_LEN {
            warn!(
                "Session secret is shorter than {} bytes; use a longer random value",
                MIN_SECRET_LEN
            );
        }

        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        Ok(JwtService {
            encoding_key,
            decoding_key,
            validation,
            config,
        })
    }

    /// Sign a session token for an identity
    pub fn issue(&self, identity: &Identity) -> Result<IssuedToken, TokenError> {
        let now = Utc::now().timestamp().max(0) as u64;

        let claims = Claims {
            sub: identity.id.clone(),
            name: identity.name.clone(),
            email: identity.email.clone(),
            role: identity.role,
            locations: identity.locations.clone(),
            iat: now,
            exp: now + self.config.max_age,
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(IssuedToken { token, claims })
    }

    /// Validate a token and return the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Ok(token_data.claims)
    }

    /// Check if a token id is blacklisted
    pub async fn is_token_blacklisted(
        &self,
        store: &dyn KeyValueStore,
        jti: &str,
    ) -> CacheResult<bool> {
        let result = store.get(&blacklist_key(jti)).await?;
        Ok(result.is_some())
    }

    /// Blacklist a token for the rest of its lifetime
    pub async fn blacklist_token(&self, store: &dyn KeyValueStore, claims: &Claims) -> CacheResult<()> {
        store
            .set(&blacklist_key(&claims.jti), "1", Expiry::At(claims.expires()))
            .await
    }

    /// Get the token lifetime
    pub fn max_age(&self) -> u64 {
        self.config.max_age
    }
}

fn blacklist_key(jti: &str) -> String {
    format!("blacklisted_token:{}", jti)
}
