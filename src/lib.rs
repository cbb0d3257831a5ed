#![doc = "The `taskhive-identity` library crate."]
#![doc = ""]
#![doc = "This crate contains the identity and session-lifecycle logic for the"]
#![doc = "TaskHive platform: staged registration with email verification, one-time"]
#![doc = "codes, credential login, rotating refresh-token sessions, and the HTTP"]
#![doc = "boundary exposing them. It is used by the main binary (`main.rs`) to"]
#![doc = "construct and run the service."]

pub mod auth;
pub mod config;
pub mod error;
pub mod mail;
pub mod models;
pub mod routes;
pub mod store;

// Re-export key types for easier use of the library crate.
pub use crate::auth::{AuthMiddleware, AuthService};
pub use crate::error::AppError;
pub use crate::models::User;
