//! Sale repository for database operations

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Row, postgres::PgRow};

use super::SaleStore;
use crate::models::Sale;

/// Sale repository for database operations
#[derive(Clone)]
pub struct SaleRepository {
    pool: PgPool,
}

impl SaleRepository {
    /// Create a new sale repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &PgRow) -> Result<Sale, sqlx::Error> {
        Ok(Sale {
            id: row.try_get("id")?,
            client_id: row.try_get("client_id")?,
            client_name: row.try_get("client_name")?,
            staff_id: row.try_get("staff_id")?,
            staff_name: row.try_get("staff_name")?,
            location_id: row.try_get("location_id")?,
            location_name: row.try_get("location_name")?,
            subtotal: row.try_get("subtotal")?,
            total_amount: row.try_get("total_amount")?,
            payment_method: row.try_get("payment_method")?,
            payment_status: row.try_get("payment_status")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl SaleStore for SaleRepository {
    async fn list(&self, location_id: Option<&str>) -> DatabaseResult<Vec<Sale>> {
        let rows = sqlx::query(
            r#"
            SELECT
                sa.id,
                sa."clientId" AS client_id,
                c.name AS client_name,
                sa."staffId" AS staff_id,
                s.name AS staff_name,
                sa."locationId" AS location_id,
                l.name AS location_name,
                sa.subtotal::float8 AS subtotal,
                sa."totalAmount"::float8 AS total_amount,
                sa."paymentMethod"::text AS payment_method,
                sa."paymentStatus"::text AS payment_status,
                sa."createdAt" AT TIME ZONE 'UTC' AS created_at
            FROM sales sa
            LEFT JOIN clients c ON c."userId" = sa."clientId"
            LEFT JOIN staff_members s ON s.id = sa."staffId"
            LEFT JOIN locations l ON l.id = sa."locationId"
            WHERE ($1::text IS NULL OR sa."locationId" = $1)
            ORDER BY sa."createdAt" DESC
            "#,
        )
        .bind(location_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        rows.iter()
            .map(Self::map_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)
    }
}
