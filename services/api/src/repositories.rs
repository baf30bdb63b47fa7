//! Repositories for database operations
//!
//! Each read model sits behind a trait; the Postgres repositories are the
//! production implementations.

use async_trait::async_trait;
use common::error::DatabaseResult;

use crate::models::{Appointment, AppointmentQuery, Client, Sale};

pub mod appointment;
pub mod client;
pub mod sale;

pub use appointment::AppointmentRepository;
pub use client::ClientRepository;
pub use sale::SaleRepository;

/// Source of active appointments
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Active appointments matching the explicit filters, ordered by date ascending
    async fn list(&self, query: &AppointmentQuery) -> DatabaseResult<Vec<Appointment>>;
}

/// Source of completed sales
#[async_trait]
pub trait SaleStore: Send + Sync {
    /// Sales, newest first, optionally restricted to one location
    async fn list(&self, location_id: Option<&str>) -> DatabaseResult<Vec<Sale>>;
}

/// Client directory
#[async_trait]
pub trait ClientDirectory: Send + Sync {
    /// First client whose normalized phone equals `normalized_phone`
    async fn find_by_phone(&self, normalized_phone: &str) -> DatabaseResult<Option<Client>>;
}
