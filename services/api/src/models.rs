//! API models for request and response payloads

pub mod appointment;
pub mod client;
pub mod sale;

pub use appointment::{Appointment, AppointmentQuery, AppointmentListResponse};
pub use client::{Client, ClientLookupQuery, ClientLookupResponse};
pub use sale::{Sale, SaleListResponse, SaleQuery};
