//! Appointment models for the API service

use chrono::{DateTime, NaiveDate, Utc};
use common::access::LocationScoped;
use serde::{Deserialize, Serialize};

/// Appointment as listed to staff
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    pub client_id: String,
    pub client_name: String,
    pub staff_id: String,
    pub staff_name: String,
    pub service_id: String,
    pub service: String,
    pub date: DateTime<Utc>,
    /// Service duration in minutes
    pub duration: i32,
    pub location_id: String,
    pub location_name: String,
    pub price: f64,
    pub notes: String,
    pub status: String,
    pub payment_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LocationScoped for Appointment {
    fn location_id(&self) -> &str {
        &self.location_id
    }
}

/// Query parameters for appointment listing
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentQuery {
    pub location_id: Option<String>,
    pub staff_id: Option<String>,
    pub client_id: Option<String>,
    /// Calendar day (UTC), `YYYY-MM-DD`
    pub date: Option<NaiveDate>,
}

/// Response for appointment listing
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentListResponse {
    pub appointments: Vec<Appointment>,
    pub total: usize,
}
