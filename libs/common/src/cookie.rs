//! Session cookie handling
//!
//! In production the cookie is `Secure` and carries the `__Secure-` name
//! prefix so browsers refuse to accept it over plain HTTP.

use axum::http::HeaderMap;
use axum_extra::{
    extract::cookie::{Cookie, CookieJar, SameSite},
    headers::{Authorization, HeaderMapExt, authorization::Bearer},
};

use crate::token::{DEFAULT_MAX_AGE, MAX_SESSION_AGE, session_max_age_from_env};

/// Base name of the session cookie
pub const SESSION_COOKIE_NAME: &str = "vanity.session-token";

/// Name prefix required for secure cookies
pub const SECURE_COOKIE_PREFIX: &str = "__Secure-";

/// Session cookie configuration
#[derive(Debug, Clone)]
pub struct CookieConfig {
    /// Mark the cookie `Secure` and use the `__Secure-` name
    pub secure: bool,
    /// Cookie lifetime in seconds
    pub max_age: u64,
}

impl CookieConfig {
    /// Create a new CookieConfig from environment variables
    ///
    /// # Environment Variables
    /// - `APP_ENV`: `production` enables secure cookies
    /// - `SESSION_MAX_AGE`: Cookie lifetime in seconds (default: 2592000)
    pub fn from_env() -> Self {
        let production = std::env::var("APP_ENV")
            .map(|env| env.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        // out-of-range values are rejected by the session config at startup
        let max_age = session_max_age_from_env().unwrap_or(DEFAULT_MAX_AGE);

        Self {
            secure: production,
            max_age,
        }
    }

    /// Cookie name for the current environment
    pub fn name(&self) -> String {
        if self.secure {
            format!("{}{}", SECURE_COOKIE_PREFIX, SESSION_COOKIE_NAME)
        } else {
            SESSION_COOKIE_NAME.to_string()
        }
    }

    /// Cookie carrying a session token
    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((self.name(), token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(time::Duration::seconds(self.max_age.min(MAX_SESSION_AGE) as i64))
            .build()
    }

    /// Expired cookie that clears the session on the client
    pub fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build((self.name(), String::new()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(time::Duration::ZERO)
            .build()
    }

    /// Session token presented by the client.
    ///
    /// The cookie wins over an `Authorization: Bearer` header.
    pub fn presented_token(&self, jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
        if let Some(cookie) = jar.get(&self.name()) {
            if !cookie.value().is_empty() {
                return Some(cookie.value().to_string());
            }
        }

        headers
            .typed_get::<Authorization<Bearer>>()
            .map(|auth| auth.token().to_string())
            .filter(|token| !token.is_empty())
    }
}
