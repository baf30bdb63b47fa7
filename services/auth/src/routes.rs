//! Authentication service routes

use axum::{
    Extension, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use common::{
    adapter::normalize_email,
    identity::Identity,
    middleware::require_session,
    session::ActiveSession,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    AppState,
    authenticator::AuthOutcome,
    models::LoginCredentials,
    validation::{validate_email, validate_password},
};

/// Response for a successful login
#[derive(Serialize)]
pub struct LoginResponse {
    pub user: Identity,
    pub expires: DateTime<Utc>,
    pub token: String,
}

/// Response describing the current session
#[derive(Serialize)]
pub struct SessionResponse {
    pub user: Identity,
    pub expires: DateTime<Utc>,
}

/// Create the router for the authentication service
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/auth/session", get(current_session))
        .route_layer(from_fn_with_state(state.guard.clone(), require_session));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .merge(protected)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = state
        .authenticator
        .store()
        .health_check()
        .await
        .unwrap_or(false);
    let cache = state.guard.sessions.health_check().await.unwrap_or(false);

    let status = if database && cache {
        StatusCode::OK
    } else {
        warn!("Health check degraded: database={} cache={}", database, cache);
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if status == StatusCode::OK { "ok" } else { "degraded" },
            "service": "auth-service",
            "database": database,
            "cache": cache,
        })),
    )
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginCredentials>,
) -> Result<impl IntoResponse, AuthError> {
    validate_email(&payload.email).map_err(AuthError::BadRequest)?;
    validate_password(&payload.password).map_err(AuthError::BadRequest)?;

    let email = normalize_email(&payload.email);
    info!("Login attempt for {}", email);

    if !state.rate_limiter.is_allowed(&email).await {
        return Err(AuthError::TooManyRequests);
    }

    let identity = match state
        .authenticator
        .authenticate(&email, &payload.password)
        .await
    {
        Ok(AuthOutcome::Authenticated(identity)) => identity,
        Ok(AuthOutcome::Rejected(_)) => return Err(AuthError::InvalidCredentials),
        Err(e) => {
            error!(
                retryable = e.is_retryable(),
                "Authentication failed for {}: {}", email, e
            );
            return Err(AuthError::InternalServerError);
        }
    };

    let session = state.guard.sessions.issue(&identity).await.map_err(|e| {
        error!("Failed to issue session for user {}: {}", identity.id, e);
        AuthError::InternalServerError
    })?;

    state.rate_limiter.reset(&email).await;

    let jar = jar.add(state.guard.cookies.session_cookie(session.token.clone()));
    let response = LoginResponse {
        user: identity,
        expires: session.expires,
        token: session.token,
    };

    Ok((StatusCode::OK, jar, Json(response)))
}

/// Logout endpoint; succeeds whether or not a session was presented
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AuthError> {
    if let Some(token) = state.guard.cookies.presented_token(&jar, &headers) {
        state.guard.sessions.revoke(&token).await.map_err(|e| {
            error!("Failed to revoke session: {}", e);
            AuthError::InternalServerError
        })?;
    }

    let jar = jar.add(state.guard.cookies.removal_cookie());

    Ok((
        StatusCode::OK,
        jar,
        Json(serde_json::json!({"message": "Logged out successfully"})),
    ))
}

/// Current session endpoint
pub async fn current_session(Extension(session): Extension<ActiveSession>) -> Json<SessionResponse> {
    Json(SessionResponse {
        user: session.identity,
        expires: session.expires,
    })
}

/// Custom error type for authentication errors
#[derive(Debug)]
pub enum AuthError {
    BadRequest(String),
    InvalidCredentials,
    TooManyRequests,
    InternalServerError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AuthError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            AuthError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "Invalid email or password".to_string(),
            ),
            AuthError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many login attempts, try again later".to_string(),
            ),
            AuthError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
