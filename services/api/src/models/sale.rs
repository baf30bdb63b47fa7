//! Sale models for the API service

use chrono::{DateTime, Utc};
use common::access::LocationScoped;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: String,
    pub client_id: Option<String>,
    pub client_name: Option<String>,
    pub staff_id: String,
    pub staff_name: Option<String>,
    pub location_id: String,
    pub location_name: Option<String>,
    pub subtotal: f64,
    pub total_amount: f64,
    pub payment_method: Option<String>,
    pub payment_status: String,
    pub created_at: DateTime<Utc>,
}

impl LocationScoped for Sale {
    fn location_id(&self) -> &str {
        &self.location_id
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleQuery {
    pub location_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaleListResponse {
    pub sales: Vec<Sale>,
    pub total: usize,
}
