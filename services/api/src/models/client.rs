//! Client models for the API service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client as returned by phone lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    /// User id; appointments reference clients by it
    pub id: String,
    pub client_record_id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientLookupQuery {
    pub phone: Option<String>,
}

/// Response for client lookup
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientLookupResponse {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<Client>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_phone: Option<String>,
}
