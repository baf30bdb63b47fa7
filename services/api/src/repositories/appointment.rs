//! Appointment repository for database operations

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::info;

use super::AppointmentStore;
use crate::models::{Appointment, AppointmentQuery};

/// Appointment repository for database operations
#[derive(Clone)]
pub struct AppointmentRepository {
    pool: PgPool,
}

impl AppointmentRepository {
    /// Create a new appointment repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &PgRow) -> Result<Appointment, sqlx::Error> {
        Ok(Appointment {
            id: row.try_get("id")?,
            client_id: row.try_get("client_id")?,
            client_name: row
                .try_get::<Option<String>, _>("client_name")?
                .unwrap_or_else(|| "Unknown Client".to_string()),
            staff_id: row.try_get("staff_id")?,
            staff_name: row
                .try_get::<Option<String>, _>("staff_name")?
                .unwrap_or_else(|| "Unknown Staff".to_string()),
            service_id: row.try_get("service_id")?,
            service: row
                .try_get::<Option<String>, _>("service_name")?
                .unwrap_or_else(|| "Unknown Service".to_string()),
            date: row.try_get("date")?,
            duration: row.try_get::<Option<i32>, _>("duration")?.unwrap_or(0),
            location_id: row.try_get("location_id")?,
            location_name: row
                .try_get::<Option<String>, _>("location_name")?
                .unwrap_or_else(|| "Unknown Location".to_string()),
            price: row.try_get::<Option<f64>, _>("price")?.unwrap_or(0.0),
            notes: row.try_get::<Option<String>, _>("notes")?.unwrap_or_default(),
            status: row.try_get("status")?,
            payment_status: row
                .try_get::<Option<String>, _>("payment_status")?
                .unwrap_or_else(|| "unpaid".to_string()),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl AppointmentStore for AppointmentRepository {
    async fn list(&self, query: &AppointmentQuery) -> DatabaseResult<Vec<Appointment>> {
        let rows = sqlx::query(
            r#"
            SELECT
                a.id,
                a."clientId" AS client_id,
                c.name AS client_name,
                a."staffId" AS staff_id,
                s.name AS staff_name,
                a."serviceId" AS service_id,
                sv.name AS service_name,
                a.date AT TIME ZONE 'UTC' AS date,
                sv.duration AS duration,
                a."locationId" AS location_id,
                l.name AS location_name,
                sv.price::float8 AS price,
                a.notes,
                a.status::text AS status,
                a."paymentStatus"::text AS payment_status,
                a."createdAt" AT TIME ZONE 'UTC' AS created_at,
                a."updatedAt" AT TIME ZONE 'UTC' AS updated_at
            FROM appointments a
            LEFT JOIN clients c ON c."userId" = a."clientId"
            LEFT JOIN staff_members s ON s.id = a."staffId"
            LEFT JOIN services sv ON sv.id = a."serviceId"
            LEFT JOIN locations l ON l.id = a."locationId"
            WHERE a."isActive" = true
              AND ($1::text IS NULL OR a."locationId" = $1)
              AND ($2::text IS NULL OR a."staffId" = $2)
              AND ($3::text IS NULL OR a."clientId" = $3)
              AND ($4::date IS NULL OR a.date::date = $4)
            ORDER BY a.date ASC
            "#,
        )
        .bind(&query.location_id)
        .bind(&query.staff_id)
        .bind(&query.client_id)
        .bind(query.date)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        let appointments = rows
            .iter()
            .map(Self::map_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)?;

        info!("Retrieved {} appointments from database", appointments.len());
        Ok(appointments)
    }
}
