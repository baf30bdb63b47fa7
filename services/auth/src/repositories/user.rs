//! User repository for credential store operations

use async_trait::async_trait;
use common::{
    database,
    error::{DatabaseError, DatabaseResult},
    identity::Role,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{info, warn};

use crate::models::{StaffProfile, User, UserRecord};

/// Read access to users and their staff profiles.
///
/// The Postgres repository is the production implementation; any other
/// backend only has to answer the same three questions.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find a user by normalized (trimmed, lower-case) email
    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<UserRecord>>;

    /// Record a successful login
    async fn update_last_login(&self, user_id: &str) -> DatabaseResult<()>;

    /// Check that the store is reachable
    async fn health_check(&self) -> DatabaseResult<bool>;
}

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &PgRow) -> Result<UserRecord, sqlx::Error> {
        let role_name: String = row.try_get("role")?;
        let role = role_name.parse::<Role>().unwrap_or_else(|e| {
            warn!("{}; treating user as CLIENT", e);
            Role::Client
        });

        let user = User {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            role,
            is_active: row.try_get("is_active")?,
            last_login: row.try_get("last_login")?,
        };

        let staff_name: Option<String> = row.try_get("staff_name")?;
        let staff_profile = staff_name.map(|name| StaffProfile {
            name,
            location_ids: row.try_get("location_ids").unwrap_or_default(),
        });

        Ok(UserRecord {
            user,
            staff_profile,
        })
    }
}

#[async_trait]
impl CredentialStore for UserRepository {
    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<UserRecord>> {
        info!("Finding user by email: {}", email);

        let row = sqlx::query(
            r#"
            SELECT
                u.id,
                u.email,
                u.password AS password_hash,
                u.role::text AS role,
                u."isActive" AS is_active,
                u."lastLogin" AT TIME ZONE 'UTC' AS last_login,
                s.name AS staff_name,
                COALESCE(
                    array_agg(l.id ORDER BY l.id) FILTER (WHERE l.id IS NOT NULL),
                    ARRAY[]::text[]
                ) AS location_ids
            FROM users u
            LEFT JOIN staff_members s ON s."userId" = u.id
            LEFT JOIN staff_locations sl ON sl."staffId" = s.id AND sl."isActive" = true
            LEFT JOIN locations l ON l.id = sl."locationId"
            WHERE lower(trim(u.email)) = $1
            GROUP BY u.id, s.id
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        row.as_ref()
            .map(Self::map_row)
            .transpose()
            .map_err(DatabaseError::Query)
    }

    async fn update_last_login(&self, user_id: &str) -> DatabaseResult<()> {
        sqlx::query(r#"UPDATE users SET "lastLogin" = NOW() WHERE id = $1"#)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        Ok(())
    }

    async fn health_check(&self) -> DatabaseResult<bool> {
        database::health_check(&self.pool).await
    }
}
