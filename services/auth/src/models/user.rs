//! User model and related functionality

use chrono::{DateTime, Utc};
use common::identity::Role;
use serde::{Deserialize, Serialize};

/// User entity as stored in the credential store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
}

/// Staff profile owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffProfile {
    pub name: String,
    /// Locations reachable through active staff-location associations
    pub location_ids: Vec<String>,
}

/// User together with its optional staff profile
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user: User,
    pub staff_profile: Option<StaffProfile>,
}

/// User login credentials
#[derive(Clone, Deserialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}
