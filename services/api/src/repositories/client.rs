//! Client repository for database operations

use async_trait::async_trait;
use common::{
    error::{DatabaseError, DatabaseResult},
    phone::normalize_phone,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;

use super::ClientDirectory;
use crate::models::Client;

/// Digits compared in SQL before the exact check
const SUFFIX_DIGITS: usize = 8;

/// Client repository for database operations
#[derive(Clone)]
pub struct ClientRepository {
    pool: PgPool,
}

impl ClientRepository {
    /// Create a new client repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &PgRow) -> Result<Client, sqlx::Error> {
        Ok(Client {
            id: row.try_get("user_id")?,
            client_record_id: row.try_get("client_record_id")?,
            name: row.try_get("name")?,
            email: row.try_get::<Option<String>, _>("email")?.unwrap_or_default(),
            phone: row.try_get::<Option<String>, _>("phone")?.unwrap_or_default(),
            notes: row.try_get::<Option<String>, _>("notes")?.unwrap_or_default(),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl ClientDirectory for ClientRepository {
    async fn find_by_phone(&self, normalized_phone: &str) -> DatabaseResult<Option<Client>> {
        let suffix = &normalized_phone[normalized_phone.len().saturating_sub(SUFFIX_DIGITS)..];

        // stored numbers are free-form; narrow by trailing digits, then compare exactly
        let rows = sqlx::query(
            r#"
            SELECT
                c.id AS client_record_id,
                c."userId" AS user_id,
                c.name,
                u.email,
                c.phone,
                c.notes,
                c."createdAt" AT TIME ZONE 'UTC' AS created_at,
                c."updatedAt" AT TIME ZONE 'UTC' AS updated_at
            FROM clients c
            LEFT JOIN users u ON u.id = c."userId"
            WHERE c.phone IS NOT NULL
              AND regexp_replace(c.phone, '\D', '', 'g') LIKE '%' || $1
            ORDER BY c."createdAt" ASC
            "#,
        )
        .bind(suffix)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        for row in &rows {
            let client = Self::map_row(row).map_err(DatabaseError::Query)?;
            if normalize_phone(&client.phone) == normalized_phone {
                info!("Client lookup matched client {}", client.client_record_id);
                return Ok(Some(client));
            }
        }

        Ok(None)
    }
}
