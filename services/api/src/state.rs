//! Application state shared across handlers

use common::middleware::SessionGuard;
use sqlx::PgPool;
use std::sync::Arc;

use crate::repositories::{AppointmentStore, ClientDirectory, SaleStore};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub guard: SessionGuard,
    pub appointments: Arc<dyn AppointmentStore>,
    pub sales: Arc<dyn SaleStore>,
    pub clients: Arc<dyn ClientDirectory>,
}
