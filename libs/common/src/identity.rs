//! Identity of an authenticated caller
//!
//! An `Identity` is what survives authentication: who the caller is, which
//! role they hold and which locations they may operate against.

use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt, str::FromStr};

/// Sentinel entry granting access to every location
pub const ALL_LOCATIONS: &str = "all";

/// User role as stored in the credential store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Staff,
    Client,
}

impl Role {
    /// Get the role name as stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Staff => "STAFF",
            Role::Client => "CLIENT",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role name is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "STAFF" => Ok(Role::Staff),
            "CLIENT" => Ok(Role::Client),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Location-access list.
///
/// Serialized as a plain list of strings; `["all"]` stands for `All`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum LocationAccess {
    /// Administrators see every location
    All,
    /// Explicit set of location ids, in first-seen order without duplicates
    Only(Vec<String>),
}

impl LocationAccess {
    /// Build the access list for a role from its staff location ids
    pub fn for_role<I>(role: Role, location_ids: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        if role == Role::Admin {
            return LocationAccess::All;
        }

        let mut seen = HashSet::new();
        let ids = location_ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();

        LocationAccess::Only(ids)
    }

    /// Whether the given location may be accessed
    pub fn permits(&self, location_id: &str) -> bool {
        match self {
            LocationAccess::All => true,
            LocationAccess::Only(ids) => ids.iter().any(|id| id == location_id),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, LocationAccess::All)
    }
}

impl From<Vec<String>> for LocationAccess {
    fn from(ids: Vec<String>) -> Self {
        if ids.iter().any(|id| id == ALL_LOCATIONS) {
            return LocationAccess::All;
        }

        let mut seen = HashSet::new();
        LocationAccess::Only(ids.into_iter().filter(|id| seen.insert(id.clone())).collect())
    }
}

impl From<LocationAccess> for Vec<String> {
    fn from(access: LocationAccess) -> Self {
        match access {
            LocationAccess::All => vec![ALL_LOCATIONS.to_string()],
            LocationAccess::Only(ids) => ids,
        }
    }
}

/// Normalized result of a successful authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub locations: LocationAccess,
}
