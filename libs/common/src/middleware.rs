//! Session guard for protected routes

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use tracing::{debug, error};

use crate::{
    cookie::CookieConfig,
    session::{ActiveSession, SessionManager},
};

/// State carried by [`require_session`]
#[derive(Clone)]
pub struct SessionGuard {
    pub sessions: SessionManager,
    pub cookies: CookieConfig,
}

/// Resolve the presented session and attach its `Identity` and
/// `ActiveSession` to the request extensions.
pub async fn require_session(
    State(guard): State<SessionGuard>,
    jar: CookieJar,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let session = match guard.authorize(&jar, req.headers()).await {
        Ok(session) => session,
        Err(status) => return rejection(status),
    };

    req.extensions_mut().insert(session.identity.clone());
    req.extensions_mut().insert(session);

    next.run(req).await
}

impl SessionGuard {
    /// Session behind the presented cookie or bearer token.
    ///
    /// Missing, invalid, expired and revoked sessions yield 401; a store
    /// failure yields 500.
    pub async fn authorize(
        &self,
        jar: &CookieJar,
        headers: &HeaderMap,
    ) -> Result<ActiveSession, StatusCode> {
        let token = self
            .cookies
            .presented_token(jar, headers)
            .ok_or(StatusCode::UNAUTHORIZED)?;

        match self.sessions.resolve(&token).await {
            Ok(Some(session)) => Ok(session),
            Ok(None) => {
                debug!("Rejected request with unknown or expired session");
                Err(StatusCode::UNAUTHORIZED)
            }
            Err(e) => {
                error!("Failed to resolve session: {}", e);
                Err(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

fn rejection(status: StatusCode) -> Response {
    let message = if status == StatusCode::UNAUTHORIZED {
        "Unauthorized"
    } else {
        "Internal server error"
    };
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cache::MemoryStore,
        identity::{Identity, LocationAccess, Role},
        session::{SessionConfig, SessionStrategy},
        token::{DEFAULT_MAX_AGE, JwtConfig, JwtService},
    };
    use axum::http::header::{AUTHORIZATION, COOKIE};
    use std::sync::Arc;

    fn guard(strategy: SessionStrategy) -> SessionGuard {
        let jwt_service = JwtService::new(JwtConfig {
            secret: "a-test-secret-that-is-long-enough-0000".to_string(),
            max_age: DEFAULT_MAX_AGE,
        })
        .unwrap();
        let config = SessionConfig {
            strategy,
            ..SessionConfig::default()
        };
        SessionGuard {
            sessions: SessionManager::new(config, jwt_service, Arc::new(MemoryStore::new())),
            cookies: CookieConfig {
                secure: false,
                max_age: DEFAULT_MAX_AGE,
            },
        }
    }

    fn identity() -> Identity {
        Identity {
            id: "staff-1".to_string(),
            name: "Sara Ahmed".to_string(),
            email: "sara@vanityhub.com".to_string(),
            role: Role::Staff,
            locations: LocationAccess::Only(vec!["loc1".to_string()]),
        }
    }

    fn cookie_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            format!("vanity.session-token={}", token).parse().unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn test_missing_session_is_unauthorized() {
        let headers = HeaderMap::new();
        let result = guard(SessionStrategy::Jwt)
            .authorize(&CookieJar::from_headers(&headers), &headers)
            .await;

        assert_eq!(result.unwrap_err(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_cookie_and_bearer_sessions_are_accepted() {
        for strategy in [SessionStrategy::Jwt, SessionStrategy::Database] {
            let guard = guard(strategy);
            let issued = guard.sessions.issue(&identity()).await.unwrap();

            let headers = cookie_headers(&issued.token);
            let session = guard
                .authorize(&CookieJar::from_headers(&headers), &headers)
                .await
                .unwrap();
            assert_eq!(session.identity, identity());

            let mut headers = HeaderMap::new();
            headers.insert(
                AUTHORIZATION,
                format!("Bearer {}", issued.token).parse().unwrap(),
            );
            let session = guard
                .authorize(&CookieJar::from_headers(&headers), &headers)
                .await
                .unwrap();
            assert_eq!(session.identity.id, "staff-1");
        }
    }

    #[tokio::test]
    async fn test_revoked_session_is_unauthorized() {
        let guard = guard(SessionStrategy::Jwt);
        let issued = guard.sessions.issue(&identity()).await.unwrap();
        guard.sessions.revoke(&issued.token).await.unwrap();

        let headers = cookie_headers(&issued.token);
        let result = guard
            .authorize(&CookieJar::from_headers(&headers), &headers)
            .await;

        assert_eq!(result.unwrap_err(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_rejection_body_is_generic() {
        let response = rejection(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
