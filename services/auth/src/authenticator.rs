//! Credential verification
//!
//! Turns an email/password pair into an [`Identity`]. Every credential
//! failure is reported as a [`AuthOutcome::Rejected`]; only infrastructure
//! faults surface as errors.

use std::sync::Arc;

use common::{
    adapter::{email_local_part, normalize_email},
    error::DatabaseError,
    identity::{Identity, LocationAccess},
};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    audit::{AuditEvent, AuditSink},
    models::UserRecord,
    password::verify_password_blocking,
    repositories::CredentialStore,
};

/// Reason a login was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    UserNotFound,
    AccountInactive,
    InvalidCredentials,
}

impl AuthFailure {
    /// Reason recorded in the audit trail; never shown to the client
    pub fn reason(&self) -> &'static str {
        match self {
            AuthFailure::UserNotFound => "User not found",
            AuthFailure::AccountInactive => "Account inactive",
            AuthFailure::InvalidCredentials => "Invalid credentials",
        }
    }
}

/// Result of an authentication attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    Authenticated(Identity),
    Rejected(AuthFailure),
}

/// Faults that prevent an attempt from being decided
#[derive(Error, Debug)]
pub enum InfrastructureError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Password verification task failed: {0}")]
    Verification(#[from] tokio::task::JoinError),
}

impl InfrastructureError {
    /// Whether retrying the same attempt later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            InfrastructureError::Database(e) => e.is_retryable(),
            InfrastructureError::Verification(_) => false,
        }
    }
}

/// Verifies credentials against a [`CredentialStore`]
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn CredentialStore>,
    audit: Arc<dyn AuditSink>,
}

impl Authenticator {
    pub fn new(store: Arc<dyn CredentialStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    pub fn store(&self) -> &dyn CredentialStore {
        self.store.as_ref()
    }

    /// Authenticate a user by email and password.
    ///
    /// The email is matched trimmed and case-insensitively. Inactive
    /// accounts are refused before the password is looked at.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthOutcome, InfrastructureError> {
        let email = normalize_email(email);

        let record = match self.store.find_by_email(&email).await {
            Ok(record) => record,
            Err(e) => {
                self.record(AuditEvent::LoginFailed {
                    email: email.clone(),
                    reason: "Authentication system error".to_string(),
                })
                .await;
                return Err(e.into());
            }
        };

        let Some(record) = record else {
            return Ok(self.reject(&email, AuthFailure::UserNotFound).await);
        };

        if !record.user.is_active {
            return Ok(self.reject(&email, AuthFailure::AccountInactive).await);
        }

        let matches = match verify_password_blocking(
            password.to_string(),
            record.user.password_hash.clone(),
        )
        .await?
        {
            Ok(matches) => matches,
            Err(e) => {
                warn!("Stored password hash for user {} is unusable: {}", record.user.id, e);
                false
            }
        };

        if !matches {
            return Ok(self.reject(&email, AuthFailure::InvalidCredentials).await);
        }

        let identity = build_identity(record);

        if let Err(e) = self.store.update_last_login(&identity.id).await {
            warn!("Failed to update last login for user {}: {}", identity.id, e);
        }

        self.record(AuditEvent::LoginSuccess {
            user_id: identity.id.clone(),
            email: identity.email.clone(),
            role: identity.role,
        })
        .await;

        info!("User {} authenticated as {}", identity.id, identity.role);
        Ok(AuthOutcome::Authenticated(identity))
    }

    async fn reject(&self, email: &str, failure: AuthFailure) -> AuthOutcome {
        info!("Login rejected for {}: {}", email, failure.reason());
        self.record(AuditEvent::LoginFailed {
            email: email.to_string(),
            reason: failure.reason().to_string(),
        })
        .await;
        AuthOutcome::Rejected(failure)
    }

    async fn record(&self, event: AuditEvent) {
        if let Err(e) = self.audit.record(&event).await {
            warn!("Failed to record audit event {}: {}", event.action(), e);
        }
    }
}

fn build_identity(record: UserRecord) -> Identity {
    let UserRecord {
        user,
        staff_profile,
    } = record;

    let (name, location_ids) = match staff_profile {
        Some(profile) => (profile.name, profile.location_ids),
        None => (email_local_part(&user.email).to_string(), Vec::new()),
    };

    Identity {
        id: user.id,
        name,
        email: user.email,
        role: user.role,
        locations: LocationAccess::for_role(user.role, location_ids),
    }
}
