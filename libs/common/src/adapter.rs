//! Key-value session adapter
//!
//! Persists users, linked accounts, sessions and verification tokens as JSON
//! values in a `KeyValueStore`. Key scheme:
//!
//! - `user:<id>` user record, `user:email:<email>` user id
//! - `account:<provider>:<providerAccountId>` user id, `account:<id>` account record
//! - `session:<token>` session record, expiring at the session expiry
//! - `verificationToken:<len>:<identifier>:<token>` verification token record,
//!   where `<len>` is the byte length of the identifier
//! - `user:sessions:<userId>`, `user:accounts:<userId>` and
//!   `verificationTokens:<identifier>` index sets used to cascade a user delete;
//!   members whose record has expired are pruned whenever a member is added
//!
//! Updates are read-modify-write without compare-and-swap; concurrent writers
//! of the same key race and the last write wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    cache::{Expiry, KeyValueStore},
    error::CacheResult,
    identity::{Identity, LocationAccess, Role},
};

/// User as known to the session store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterUser {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    pub email_verified: Option<DateTime<Utc>>,
    pub role: Role,
    pub locations: LocationAccess,
}

impl AdapterUser {
    /// Identity for a stored user; falls back to the email local part for the name
    pub fn identity(&self) -> Identity {
        let name = self
            .name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| email_local_part(&self.email).to_string());

        Identity {
            id: self.id.clone(),
            name,
            email: self.email.clone(),
            role: self.role,
            locations: self.locations.clone(),
        }
    }
}

impl From<&Identity> for AdapterUser {
    fn from(identity: &Identity) -> Self {
        AdapterUser {
            id: identity.id.clone(),
            name: Some(identity.name.clone()),
            email: identity.email.clone(),
            email_verified: None,
            role: identity.role,
            locations: identity.locations.clone(),
        }
    }
}

/// New user payload; the adapter assigns the id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAdapterUser {
    pub name: Option<String>,
    pub email: String,
    pub email_verified: Option<DateTime<Utc>>,
    pub role: Role,
    pub locations: LocationAccess,
}

/// Link between a user and an external identity provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub provider: String,
    pub provider_account_id: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
    pub scope: Option<String>,
}

/// Server-side session record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_token: String,
    pub user_id: String,
    pub expires: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }
}

/// Result of a composite session lookup
#[derive(Debug, Clone, PartialEq)]
pub struct SessionAndUser {
    pub session: Session,
    pub user: AdapterUser,
}

/// Single-use out-of-band confirmation token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationToken {
    pub identifier: String,
    pub token: String,
    pub expires: DateTime<Utc>,
}

/// Session adapter over a key-value store
#[derive(Clone)]
pub struct SessionAdapter {
    store: Arc<dyn KeyValueStore>,
}

impl SessionAdapter {
    /// Create a new session adapter
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Underlying store
    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        match self.store.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T, expiry: Expiry) -> CacheResult<()> {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, &raw, expiry).await
    }

    // Users

    /// Create a user with a fresh id
    pub async fn create_user(&self, new_user: NewAdapterUser) -> CacheResult<AdapterUser> {
        let user = AdapterUser {
            id: Uuid::new_v4().to_string(),
            name: new_user.name,
            email: normalize_email(&new_user.email),
            email_verified: new_user.email_verified,
            role: new_user.role,
            locations: new_user.locations,
        };

        self.write(&user_key(&user.id), &user, Expiry::Never).await?;
        self.store
            .set(&user_email_key(&user.email), &user.id, Expiry::Never)
            .await?;

        info!("Created session user {}", user.id);
        Ok(user)
    }

    /// Get a user by id
    pub async fn get_user(&self, id: &str) -> CacheResult<Option<AdapterUser>> {
        self.read(&user_key(id)).await
    }

    /// Get a user by email
    pub async fn get_user_by_email(&self, email: &str) -> CacheResult<Option<AdapterUser>> {
        match self.store.get(&user_email_key(&normalize_email(email))).await? {
            Some(user_id) => self.get_user(&user_id).await,
            None => Ok(None),
        }
    }

    /// Get the user linked to a provider account
    pub async fn get_user_by_account(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> CacheResult<Option<AdapterUser>> {
        match self
            .store
            .get(&account_link_key(provider, provider_account_id))
            .await?
        {
            Some(user_id) => self.get_user(&user_id).await,
            None => Ok(None),
        }
    }

    /// Insert or replace a user, keeping the email index in step
    pub async fn update_user(&self, user: &AdapterUser) -> CacheResult<AdapterUser> {
        let mut user = user.clone();
        user.email = normalize_email(&user.email);

        if let Some(previous) = self.get_user(&user.id).await? {
            if previous.email != user.email {
                self.remove_email_index(&previous).await?;
            }
        }

        self.write(&user_key(&user.id), &user, Expiry::Never).await?;
        self.store
            .set(&user_email_key(&user.email), &user.id, Expiry::Never)
            .await?;

        Ok(user)
    }

    /// Delete a user together with its sessions and linked accounts
    pub async fn delete_user(&self, id: &str) -> CacheResult<()> {
        let Some(user) = self.get_user(id).await? else {
            return Ok(());
        };

        let sessions_key = user_sessions_key(id);
        for token in self.store.set_members(&sessions_key).await? {
            self.store.delete(&session_key(&token)).await?;
        }
        self.store.delete(&sessions_key).await?;

        let accounts_key = user_accounts_key(id);
        for account_id in self.store.set_members(&accounts_key).await? {
            if let Some(account) = self.read::<Account>(&account_key(&account_id)).await? {
                self.store
                    .delete(&account_link_key(&account.provider, &account.provider_account_id))
                    .await?;
            }
            self.store.delete(&account_key(&account_id)).await?;
        }
        self.store.delete(&accounts_key).await?;

        let tokens_key = verification_tokens_key(&user.email);
        for token in self.store.set_members(&tokens_key).await? {
            self.store
                .delete(&verification_token_key(&user.email, &token))
                .await?;
        }
        self.store.delete(&tokens_key).await?;

        self.remove_email_index(&user).await?;
        self.store.delete(&user_key(id)).await?;

        info!("Deleted session user {} with its sessions and accounts", id);
        Ok(())
    }

    async fn remove_email_index(&self, user: &AdapterUser) -> CacheResult<()> {
        let email_key = user_email_key(&user.email);
        // another user may have claimed the address since
        if self.store.get(&email_key).await?.as_deref() == Some(user.id.as_str()) {
            self.store.delete(&email_key).await?;
        }
        Ok(())
    }

    // Accounts

    /// Link a provider account to an existing user
    pub async fn link_account(&self, account: &Account) -> CacheResult<Option<Account>> {
        if self.get_user(&account.user_id).await?.is_none() {
            return Ok(None);
        }

        self.store
            .set(
                &account_link_key(&account.provider, &account.provider_account_id),
                &account.user_id,
                Expiry::Never,
            )
            .await?;
        self.write(&account_key(&account.id), account, Expiry::Never)
            .await?;
        self.store
            .set_add(&user_accounts_key(&account.user_id), &account.id)
            .await?;

        Ok(Some(account.clone()))
    }

    /// Remove a provider account link; unknown links are ignored
    pub async fn unlink_account(&self, provider: &str, provider_account_id: &str) -> CacheResult<()> {
        let link_key = account_link_key(provider, provider_account_id);
        let Some(user_id) = self.store.get(&link_key).await? else {
            return Ok(());
        };

        let accounts_key = user_accounts_key(&user_id);
        for account_id in self.store.set_members(&accounts_key).await? {
            let Some(account) = self.read::<Account>(&account_key(&account_id)).await? else {
                continue;
            };
            if account.provider == provider && account.provider_account_id == provider_account_id {
                self.store.delete(&account_key(&account_id)).await?;
                self.store.set_remove(&accounts_key, &account_id).await?;
            }
        }

        self.store.delete(&link_key).await
    }

    // Sessions

    /// Create a session for an existing user.
    ///
    /// Returns `None` when the user does not exist.
    pub async fn create_session(
        &self,
        session_token: &str,
        user_id: &str,
        expires: DateTime<Utc>,
    ) -> CacheResult<Option<Session>> {
        if self.get_user(user_id).await?.is_none() {
            return Ok(None);
        }

        let session = Session {
            session_token: session_token.to_string(),
            user_id: user_id.to_string(),
            expires,
        };

        self.write(&session_key(session_token), &session, Expiry::At(expires))
            .await?;
        let index = user_sessions_key(user_id);
        self.prune_index(&index, session_key).await?;
        self.store.set_add(&index, session_token).await?;

        Ok(Some(session))
    }

    /// Look up a session and its user; absent, expired or orphaned sessions yield `None`
    pub async fn get_session_and_user(
        &self,
        session_token: &str,
    ) -> CacheResult<Option<SessionAndUser>> {
        let Some(session) = self.read::<Session>(&session_key(session_token)).await? else {
            return Ok(None);
        };

        if session.is_expired(Utc::now()) {
            debug!("Session expired for user {}", session.user_id);
            self.delete_session(session_token).await?;
            return Ok(None);
        }

        match self.get_user(&session.user_id).await? {
            Some(user) => Ok(Some(SessionAndUser { session, user })),
            None => Ok(None),
        }
    }

    /// Update an existing session; returns `None` if it no longer exists
    pub async fn update_session(
        &self,
        session_token: &str,
        user_id: &str,
        expires: DateTime<Utc>,
    ) -> CacheResult<Option<Session>> {
        let key = session_key(session_token);
        let Some(mut session) = self.read::<Session>(&key).await? else {
            return Ok(None);
        };

        if session.user_id != user_id {
            self.store
                .set_remove(&user_sessions_key(&session.user_id), session_token)
                .await?;
            self.store
                .set_add(&user_sessions_key(user_id), session_token)
                .await?;
        }

        session.user_id = user_id.to_string();
        session.expires = expires;
        self.write(&key, &session, Expiry::At(expires)).await?;

        Ok(Some(session))
    }

    /// Delete a session; deleting a missing session is not an error
    pub async fn delete_session(&self, session_token: &str) -> CacheResult<()> {
        let key = session_key(session_token);
        if let Some(session) = self.read::<Session>(&key).await? {
            self.store
                .set_remove(&user_sessions_key(&session.user_id), session_token)
                .await?;
        }
        self.store.delete(&key).await
    }

    // Verification tokens

    /// Store a single-use verification token
    pub async fn create_verification_token(
        &self,
        token: &VerificationToken,
    ) -> CacheResult<VerificationToken> {
        self.write(
            &verification_token_key(&token.identifier, &token.token),
            token,
            Expiry::At(token.expires),
        )
        .await?;
        let index = verification_tokens_key(&token.identifier);
        self.prune_index(&index, |member| {
            verification_token_key(&token.identifier, member)
        })
        .await?;
        self.store.set_add(&index, &token.token).await?;
        Ok(token.clone())
    }

    /// Consume a verification token.
    ///
    /// The identifier is part of the key, so a mismatched identifier never
    /// touches the stored token. A match is read and deleted atomically.
    pub async fn use_verification_token(
        &self,
        identifier: &str,
        token: &str,
    ) -> CacheResult<Option<VerificationToken>> {
        let Some(raw) = self
            .store
            .take(&verification_token_key(identifier, token))
            .await?
        else {
            return Ok(None);
        };
        self.store
            .set_remove(&verification_tokens_key(identifier), token)
            .await?;

        let verification: VerificationToken = serde_json::from_str(&raw)?;
        if verification.identifier != identifier {
            debug!("Verification token identifier mismatch");
            return Ok(None);
        }
        if verification.expires <= Utc::now() {
            return Ok(None);
        }

        Ok(Some(verification))
    }

    /// Drop index members whose record is gone (expired by TTL or abandoned)
    async fn prune_index<F>(&self, index: &str, record_key: F) -> CacheResult<()>
    where
        F: Fn(&str) -> String,
    {
        for member in self.store.set_members(index).await? {
            if self.store.get(&record_key(&member)).await?.is_none() {
                self.store.set_remove(index, &member).await?;
            }
        }
        Ok(())
    }
}

/// Lower-case and trim an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Part of an email address before the `@`
pub fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}

fn user_key(id: &str) -> String {
    format!("user:{}", id)
}

fn user_email_key(email: &str) -> String {
    format!("user:email:{}", email)
}

fn user_sessions_key(user_id: &str) -> String {
    format!("user:sessions:{}", user_id)
}

fn user_accounts_key(user_id: &str) -> String {
    format!("user:accounts:{}", user_id)
}

fn account_link_key(provider: &str, provider_account_id: &str) -> String {
    format!("account:{}:{}", provider, provider_account_id)
}

fn account_key(id: &str) -> String {
    format!("account:{}", id)
}

fn session_key(token: &str) -> String {
    format!("session:{}", token)
}

fn verification_token_key(identifier: &str, token: &str) -> String {
    format!("verificationToken:{}:{}:{}", identifier.len(), identifier, token)
}

fn verification_tokens_key(identifier: &str) -> String {
    format!("verificationTokens:{}", identifier)
}
