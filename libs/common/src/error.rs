//! Custom error types for the common library
//!
//! This module defines application-specific error types that can be used
//! throughout the application. Every variant here is an infrastructure
//! failure; credential and session outcomes are modelled as values, not errors.

use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Error occurred during database query execution
    #[error("Database query error: {0}")]
    Query(#[source] SqlxError),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

impl DatabaseError {
    /// Whether retrying the same operation later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            DatabaseError::Connection(_) => true,
            DatabaseError::Query(e) => matches!(
                e,
                SqlxError::PoolTimedOut | SqlxError::PoolClosed | SqlxError::Io(_)
            ),
            DatabaseError::Configuration(_) => false,
        }
    }
}

/// Custom error type for key-value store operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// The Redis server could not be reached or rejected a command
    #[error("Cache backend error: {0}")]
    Backend(#[from] redis::RedisError),

    /// A stored value could not be encoded or decoded
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Cache configuration error: {0}")]
    Configuration(String),
}

/// Errors raised while signing session tokens
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Token encoding error: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),

    #[error("Token configuration error: {0}")]
    Configuration(String),
}

/// Errors raised while issuing a session
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The session owner vanished between lookup and session creation
    #[error("Session owner {0} does not exist")]
    UnknownUser(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Type alias for Result with CacheError
pub type CacheResult<T> = Result<T, CacheError>;
