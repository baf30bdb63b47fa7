//! Repositories for credential store access

pub mod user;

pub use user::{CredentialStore, UserRepository};
